use crate::series::Series;

#[derive(Debug, Clone)]
pub enum AppEvent {
    Ui(UiEvent),
    Timer(TimerEvent),
    Data(DataEvent),
    Chat(ChatEvent),
}

#[derive(Debug, Clone, PartialEq)]
pub enum UiEvent {
    SwitchTab,
    Quit,

    // Replay controls
    PlayPause,
    Reset,
    Seek { delta: i64 },
    SeekStart,
    SeekEnd,
    StepSizeChanged { delta: i64 },
    ReloadData,

    // Chat panel
    InputChar { ch: char },
    InputBackspace,
    InputClear,
    Submit,
    ExampleQuestion { index: usize },
    ScrollChat { delta: i32 },
}

#[derive(Debug, Clone)]
pub enum TimerEvent {
    ReplayTick,
}

#[derive(Debug, Clone)]
pub enum DataEvent {
    Loaded { source: String, series: Series },
    Failed { source: String, message: String },
}

#[derive(Debug, Clone)]
pub enum ChatEvent {
    Answer { id: u64, text: String },
    Failed { id: u64, message: String },
    /// A newer question was queued before this one went out.
    Skipped { id: u64 },
}
