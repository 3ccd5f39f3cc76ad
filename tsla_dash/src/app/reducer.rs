use super::event::*;
use super::state::*;
use crate::chat::{ChatRequest, DataContext, EXAMPLE_QUESTIONS};
use crate::debug_hooks;
use crate::replay::ReplayPhase;
use std::sync::Arc;

const MAX_INPUT_CHARS: usize = 500;
const MAX_STEP: i64 = 1_000;

pub fn reduce(state: &mut AppState, ev: AppEvent) -> bool {
    match ev {
        AppEvent::Ui(u) => reduce_ui(state, u),
        AppEvent::Timer(t) => reduce_timer(state, t),
        AppEvent::Data(d) => reduce_data(state, d),
        AppEvent::Chat(c) => reduce_chat(state, c),
    }
}

fn reduce_ui(state: &mut AppState, ev: UiEvent) -> bool {
    match ev {
        UiEvent::SwitchTab => {
            state.tab = state.tab.next();
            true
        }
        UiEvent::Quit => {
            state.should_quit = true;
            true
        }

        UiEvent::PlayPause => {
            if !state.has_data() {
                state.status_message = "No data loaded.".to_string();
                return true;
            }
            state.replay.toggle();
            state.status_message = match state.replay.phase() {
                ReplayPhase::Playing => "Playing.".to_string(),
                ReplayPhase::Stopped => "Paused.".to_string(),
                ReplayPhase::Finished => "Replay finished.".to_string(),
            };
            true
        }
        UiEvent::Reset => {
            state.replay.reset();
            state.status_message = "Replay reset.".to_string();
            true
        }
        UiEvent::Seek { delta } => {
            let before = state.replay.cursor();
            state.replay.step_by(delta);
            state.replay.cursor() != before
        }
        UiEvent::SeekStart => {
            state.replay.seek(0);
            true
        }
        UiEvent::SeekEnd => {
            let len = state.replay.len() as i64;
            state.replay.seek(len);
            true
        }
        UiEvent::StepSizeChanged { delta } => {
            let next = (state.replay.step() as i64 + delta).clamp(1, MAX_STEP) as usize;
            state.replay.set_step(next);
            state.replay_cfg.step = next;
            state.step_changed = true;
            state.status_message = format!("Step: {} candle(s) per tick", next);
            true
        }
        UiEvent::ReloadData => {
            state.reload_requested = true;
            state.status_message = format!("Reloading {}...", state.source_label);
            true
        }

        UiEvent::InputChar { ch } => {
            if ch.is_control() || state.chat.input.chars().count() >= MAX_INPUT_CHARS {
                return false;
            }
            state.chat.input.push(ch);
            true
        }
        UiEvent::InputBackspace => state.chat.input.pop().is_some(),
        UiEvent::InputClear => {
            let had = !state.chat.input.is_empty();
            state.chat.input.clear();
            had
        }
        UiEvent::Submit => {
            let question = state.chat.input.trim().to_string();
            if question.is_empty() {
                return false;
            }
            if submit_question(state, question) {
                state.chat.input.clear();
            }
            true
        }
        UiEvent::ExampleQuestion { index } => match EXAMPLE_QUESTIONS.get(index) {
            Some(q) => {
                submit_question(state, (*q).to_string());
                true
            }
            None => false,
        },
        UiEvent::ScrollChat { delta } => {
            let next = (state.chat.scroll_back as i32 + delta).max(0) as u16;
            let changed = next != state.chat.scroll_back;
            state.chat.scroll_back = next;
            changed
        }
    }
}

/// Queues a question for the chat worker. Returns false when nothing was
/// sent; the reason goes into the chat history.
fn submit_question(state: &mut AppState, question: String) -> bool {
    if let ChatAvailability::Disabled { reason } = &state.chat.availability {
        let reason = reason.clone();
        state.chat.push(ChatRole::Notice, reason, None);
        return false;
    }
    let Some(context) = state.context.clone() else {
        state
            .chat
            .push(ChatRole::Notice, "No data loaded; nothing to analyze yet.", None);
        return false;
    };

    let chat = &mut state.chat;
    chat.latest_id += 1;
    let id = chat.latest_id;
    if let Some(prev) = chat.pending.replace(id) {
        debug_hooks::log_chat_superseded(prev, id);
    }
    chat.push(ChatRole::User, question.clone(), Some(id));
    chat.outbox.push(ChatRequest {
        id,
        question,
        context,
    });
    true
}

fn reduce_chat(state: &mut AppState, ev: ChatEvent) -> bool {
    let chat = &mut state.chat;
    match ev {
        ChatEvent::Answer { id, text } => {
            if id == chat.latest_id {
                chat.pending = None;
                chat.push(ChatRole::Assistant, text, Some(id));
            } else {
                debug_hooks::log_chat_superseded(id, chat.latest_id);
                chat.push(
                    ChatRole::Notice,
                    format!("(superseded answer to question #{id})\n{text}"),
                    Some(id),
                );
            }
            true
        }
        ChatEvent::Failed { id, message } => {
            if id == chat.latest_id {
                chat.pending = None;
                chat.push(ChatRole::Error, format!("Error: {message}"), Some(id));
            } else {
                tracing::debug!(id, "dropping failure for superseded question: {message}");
            }
            true
        }
        ChatEvent::Skipped { id } => {
            debug_hooks::log_chat_superseded(id, chat.latest_id);
            false
        }
    }
}

fn reduce_timer(state: &mut AppState, ev: TimerEvent) -> bool {
    match ev {
        TimerEvent::ReplayTick => {
            if state.replay.phase() != ReplayPhase::Playing {
                return false;
            }
            state.replay.advance();
            if state.replay.phase() == ReplayPhase::Finished {
                state.status_message = "Replay finished.".to_string();
            }
            true
        }
    }
}

fn reduce_data(state: &mut AppState, ev: DataEvent) -> bool {
    state.reload_requested = false;
    match ev {
        DataEvent::Loaded { source, series } => {
            let len = series.len();
            state.context = match DataContext::build(&series, state.chat.row_limit) {
                Ok(ctx) => Some(Arc::new(ctx)),
                Err(err) => {
                    tracing::warn!("chat context unavailable: {err}");
                    None
                }
            };
            if len == 0 {
                state.context = None;
            }
            state.series = series;
            state.source_label = source;

            state.replay.reload(len);
            state.replay.set_step(state.replay_cfg.step);
            state.replay.seek(state.replay_cfg.lead_in.min(len) as i64);
            if state.replay_cfg.autoplay {
                state.replay.start();
            }

            if len == 0 {
                state.data_banner = Some(Banner::warn(format!(
                    "{} has no data rows",
                    state.source_label
                )));
                state.status_message = "No data.".to_string();
            } else {
                state.data_banner = None;
                state.status_message = format!("Loaded {} rows from {}", len, state.source_label);
            }
            tracing::info!(rows = len, source = %state.source_label, "series loaded");
            true
        }
        DataEvent::Failed { source, message } => {
            tracing::warn!(source = %source, "data load failed: {message}");
            if state.has_data() {
                state.data_banner = Some(Banner::error(format!(
                    "Reload of {source} failed: {message} (showing previous data)"
                )));
                state.status_message = "Reload failed.".to_string();
            } else {
                state.source_label = source;
                state.data_banner = Some(Banner::error(format!("Data error: {message}")));
                state.status_message = "No data.".to_string();
            }
            true
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ReplayConfig;
    use crate::series::tests::series;

    fn ready_state() -> AppState {
        AppState::new(
            ReplayConfig::default(),
            ChatPanel::new(ChatAvailability::Ready, None),
        )
    }

    fn loaded(n: usize) -> AppState {
        let mut st = ready_state();
        reduce(
            &mut st,
            AppEvent::Data(DataEvent::Loaded {
                source: "test.csv".to_string(),
                series: series(n),
            }),
        );
        st
    }

    fn ui(st: &mut AppState, ev: UiEvent) -> bool {
        reduce(st, AppEvent::Ui(ev))
    }

    fn tick(st: &mut AppState) -> bool {
        reduce(st, AppEvent::Timer(TimerEvent::ReplayTick))
    }

    fn ask(st: &mut AppState, q: &str) {
        st.chat.input = q.to_string();
        ui(st, UiEvent::Submit);
    }

    #[test]
    fn load_applies_lead_in_and_waits() {
        let st = loaded(50);
        assert_eq!(st.replay.cursor(), 10);
        assert_eq!(st.replay.phase(), ReplayPhase::Stopped);
        assert!(st.data_banner.is_none());
        assert!(st.context.is_some());
        assert_eq!(st.status_message, "Loaded 50 rows from test.csv");
    }

    #[test]
    fn lead_in_is_clamped_to_short_series() {
        let st = loaded(4);
        assert_eq!(st.replay.cursor(), 4);
    }

    #[test]
    fn autoplay_starts_after_load() {
        let mut st = AppState::new(
            ReplayConfig {
                autoplay: true,
                ..ReplayConfig::default()
            },
            ChatPanel::new(ChatAvailability::Ready, None),
        );
        reduce(
            &mut st,
            AppEvent::Data(DataEvent::Loaded {
                source: "a.csv".to_string(),
                series: series(30),
            }),
        );
        assert_eq!(st.replay.phase(), ReplayPhase::Playing);
    }

    #[test]
    fn ticks_only_advance_while_playing() {
        let mut st = loaded(20);
        assert!(!tick(&mut st));
        assert_eq!(st.replay.cursor(), 10);

        ui(&mut st, UiEvent::PlayPause);
        assert!(tick(&mut st));
        assert_eq!(st.replay.cursor(), 11);

        ui(&mut st, UiEvent::PlayPause);
        assert!(!tick(&mut st));
        assert_eq!(st.replay.cursor(), 11);
    }

    #[test]
    fn replay_runs_to_finish() {
        let mut st = loaded(15);
        ui(&mut st, UiEvent::PlayPause);
        for _ in 0..5 {
            tick(&mut st);
        }
        assert_eq!(st.replay.phase(), ReplayPhase::Finished);
        assert_eq!(st.status_message, "Replay finished.");
        assert!(!tick(&mut st));
    }

    #[test]
    fn step_size_is_clamped_and_remembered() {
        let mut st = loaded(20);
        assert!(!st.step_changed);
        ui(&mut st, UiEvent::StepSizeChanged { delta: -5 });
        assert_eq!(st.replay.step(), 1);
        ui(&mut st, UiEvent::StepSizeChanged { delta: 3 });
        assert_eq!(st.replay.step(), 4);
        assert_eq!(st.replay_cfg.step, 4);
        assert!(st.step_changed);

        ui(&mut st, UiEvent::PlayPause);
        tick(&mut st);
        assert_eq!(st.replay.cursor(), 14);
    }

    #[test]
    fn seek_events_clamp() {
        let mut st = loaded(20);
        ui(&mut st, UiEvent::Seek { delta: -100 });
        assert_eq!(st.replay.cursor(), 0);
        assert!(!ui(&mut st, UiEvent::Seek { delta: -1 }));
        ui(&mut st, UiEvent::SeekEnd);
        assert_eq!(st.replay.cursor(), 20);
        ui(&mut st, UiEvent::SeekStart);
        assert_eq!(st.replay.cursor(), 0);
    }

    #[test]
    fn play_without_data_is_refused() {
        let mut st = ready_state();
        ui(&mut st, UiEvent::PlayPause);
        assert_eq!(st.replay.phase(), ReplayPhase::Stopped);
        assert_eq!(st.status_message, "No data loaded.");
    }

    #[test]
    fn failed_first_load_shows_banner() {
        let mut st = ready_state();
        reduce(
            &mut st,
            AppEvent::Data(DataEvent::Failed {
                source: "bad.csv".to_string(),
                message: "row 3: column `close` is not a number".to_string(),
            }),
        );
        let banner = st.banner().unwrap();
        assert_eq!(banner.level, BannerLevel::Error);
        assert!(banner.text.contains("row 3"));
        assert!(!st.has_data());
    }

    #[test]
    fn failed_reload_keeps_previous_series() {
        let mut st = loaded(25);
        ui(&mut st, UiEvent::ReloadData);
        assert!(st.reload_requested);
        reduce(
            &mut st,
            AppEvent::Data(DataEvent::Failed {
                source: "test.csv".to_string(),
                message: "boom".to_string(),
            }),
        );
        assert!(!st.reload_requested);
        assert_eq!(st.series.len(), 25);
        assert!(st.banner().unwrap().text.contains("showing previous data"));
    }

    #[test]
    fn submit_queues_request_and_clears_input() {
        let mut st = loaded(12);
        ask(&mut st, "  What was the highest price?  ");
        assert!(st.chat.input.is_empty());
        assert_eq!(st.chat.pending, Some(1));
        assert_eq!(st.chat.outbox.len(), 1);
        assert_eq!(st.chat.outbox[0].question, "What was the highest price?");
        assert_eq!(st.chat.history[0].role, ChatRole::User);
    }

    #[test]
    fn blank_input_is_ignored() {
        let mut st = loaded(12);
        ask(&mut st, "   ");
        assert!(st.chat.outbox.is_empty());
        assert!(st.chat.history.is_empty());
    }

    #[test]
    fn missing_credential_produces_no_request() {
        let mut st = AppState::new(
            ReplayConfig::default(),
            ChatPanel::new(
                ChatAvailability::Disabled {
                    reason: "chat disabled: GEMINI_API_KEY is not set (environment or .env)"
                        .to_string(),
                },
                None,
            ),
        );
        reduce(
            &mut st,
            AppEvent::Data(DataEvent::Loaded {
                source: "x.csv".to_string(),
                series: series(30),
            }),
        );
        ask(&mut st, "anything");
        assert!(st.chat.outbox.is_empty());
        assert_eq!(st.chat.pending, None);
        assert_eq!(st.chat.history[0].role, ChatRole::Notice);
        // input is kept so it can be sent once chat works
        assert_eq!(st.chat.input, "anything");
        assert_eq!(st.banner().unwrap().level, BannerLevel::Warn);

        // replay still works
        ui(&mut st, UiEvent::PlayPause);
        assert_eq!(st.replay.phase(), ReplayPhase::Playing);
        assert!(tick(&mut st));
        assert_eq!(st.replay.cursor(), 11);
    }

    #[test]
    fn chat_needs_data() {
        let mut st = ready_state();
        ask(&mut st, "hello");
        assert!(st.chat.outbox.is_empty());
        assert_eq!(st.chat.history[0].role, ChatRole::Notice);
    }

    #[test]
    fn stale_answer_does_not_replace_latest() {
        let mut st = loaded(12);
        ask(&mut st, "first");
        ask(&mut st, "second");
        assert_eq!(st.chat.pending, Some(2));

        reduce(
            &mut st,
            AppEvent::Chat(ChatEvent::Answer {
                id: 1,
                text: "old".to_string(),
            }),
        );
        assert_eq!(st.chat.pending, Some(2));
        let last = st.chat.history.last().unwrap();
        assert_eq!(last.role, ChatRole::Notice);
        assert!(last.text.contains("superseded"));

        reduce(
            &mut st,
            AppEvent::Chat(ChatEvent::Answer {
                id: 2,
                text: "new".to_string(),
            }),
        );
        assert_eq!(st.chat.pending, None);
        let last = st.chat.history.last().unwrap();
        assert_eq!(last.role, ChatRole::Assistant);
        assert_eq!(last.text, "new");
    }

    #[test]
    fn failure_is_shown_inline_and_resubmittable() {
        let mut st = loaded(12);
        ask(&mut st, "q");
        reduce(
            &mut st,
            AppEvent::Chat(ChatEvent::Failed {
                id: 1,
                message: "Rate limit exceeded. Please wait a minute before trying again.".to_string(),
            }),
        );
        assert_eq!(st.chat.pending, None);
        assert_eq!(st.chat.history.last().unwrap().role, ChatRole::Error);

        ask(&mut st, "q");
        assert_eq!(st.chat.pending, Some(2));
        assert_eq!(st.chat.outbox.len(), 2);
    }

    #[test]
    fn example_questions_submit_directly() {
        let mut st = loaded(12);
        assert!(ui(&mut st, UiEvent::ExampleQuestion { index: 0 }));
        assert_eq!(st.chat.outbox[0].question, EXAMPLE_QUESTIONS[0]);
        assert!(!ui(&mut st, UiEvent::ExampleQuestion { index: 6 }));
    }

    #[test]
    fn input_editing() {
        let mut st = ready_state();
        for ch in "abc".chars() {
            ui(&mut st, UiEvent::InputChar { ch });
        }
        assert!(!ui(&mut st, UiEvent::InputChar { ch: '\n' }));
        ui(&mut st, UiEvent::InputBackspace);
        assert_eq!(st.chat.input, "ab");
        assert!(ui(&mut st, UiEvent::InputClear));
        assert!(!ui(&mut st, UiEvent::InputClear));
    }

    #[test]
    fn tab_switch_and_quit() {
        let mut st = ready_state();
        ui(&mut st, UiEvent::SwitchTab);
        assert_eq!(st.tab, Tab::Chat);
        ui(&mut st, UiEvent::SwitchTab);
        assert_eq!(st.tab, Tab::Chart);
        ui(&mut st, UiEvent::Quit);
        assert!(st.should_quit);
    }
}
