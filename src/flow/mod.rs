//! Guided support flow.
//!
//! A conversation opens with an intro question, then either orders a
//! peripheral (`newTicket`) or looks up an existing ticket
//! (`findTicket`). A found ticket that was not pinged yet asks whether to
//! ping it (`pingTicket`). Each lookup runs as an invoked service while
//! the region sits in `pending`; another answer while the region is
//! active restarts the lookup.
//!
//! ```text
//! intro ──new_ticket──▶ newTicket { question → pending → done | noResults | error } ──▶ itemOrdered
//!       ──find_ticket─▶ findTicket { question → pending → done | noResults | error } ──▶ pingTicket
//! pingTicket { shouldSkip → question | done;  question ──ping_order──▶ done | ──other──▶ skipped }
//! ```
//!
//! # Example
//!
//! ```rust
//! use chartflow::flow::{self, answer, LookupConfig};
//! use chartflow::interpreter::SessionConfig;
//!
//! # tokio_test_runtime(async {
//! let session = flow::configure_with(LookupConfig::immediate(), SessionConfig::default()).unwrap();
//! session.send(answer("intro", "new_ticket")).unwrap();
//! session.send(answer("newTicket", "monitor")).unwrap();
//!
//! let ordered = session.wait_until(|s| s.matches("itemOrdered")).await.unwrap();
//! assert_eq!(ordered.context.results.count, Some(23));
//! # });
//! # fn tokio_test_runtime(f: impl std::future::Future<Output = ()>) {
//! #     tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(f)
//! # }
//! ```

pub mod context;
pub mod handlers;
pub mod lookup;

pub use context::{answer, Answer, ChatEntry, FlowContext, LookupResult, Query, ANSWER_USER};
pub use lookup::{LookupConfig, DEFAULT_LOOKUP_DELAY};

use crate::builder::{BuildError, ChartBuilder, StateBuilder, TransitionBuilder};
use crate::core::{Machine, StateChart};
use crate::interpreter::{EngineError, SessionConfig, SessionHandle};
use std::sync::Arc;

pub const INTRO: &str = "intro";
pub const QUESTION: &str = "question";
pub const NEW_TICKET: &str = "newTicket";
pub const FIND_TICKET: &str = "findTicket";
pub const PENDING: &str = "pending";
pub const DONE: &str = "done";
pub const ERROR: &str = "error";
pub const NO_RESULTS: &str = "noResults";
pub const PING_TICKET: &str = "pingTicket";
pub const SHOULD_SKIP: &str = "shouldSkip";
pub const SKIPPED: &str = "skipped";
pub const ITEM_ORDERED: &str = "itemOrdered";

/// Id of the flow chart.
pub const FLOW_ID: &str = "supportFlow";

/// Active paths a conversation can end in.
pub const OUTCOMES: [&str; 7] = [
    "newTicket.noResults",
    "newTicket.error",
    "findTicket.noResults",
    "findTicket.error",
    "itemOrdered",
    "pingTicket.done",
    "pingTicket.skipped",
];

/// Question asked on entering the state `key`, as a transcript entry.
pub fn question_for(key: &str) -> Option<ChatEntry> {
    let question = match key {
        INTRO => "Konnichiwa How may I help you today?",
        NEW_TICKET => "What would you like to order?",
        FIND_TICKET => "Please enter a ticket number",
        PING_TICKET => "What you like to send a ping to this ticket?",
        _ => return None,
    };
    Some(ChatEntry {
        question: question.to_string(),
        key: key.to_string(),
        answer: None,
    })
}

/// Region that asks a question, looks the answer up and completes on a
/// passing result.
fn lookup_region(key: &str, ask: &str, service: &str, found: &str, next: &str) -> StateBuilder {
    StateBuilder::compound(key)
        .initial(QUESTION)
        .transition(
            TransitionBuilder::to(format!(".{PENDING}"))
                .event(ANSWER_USER)
                .action("updateCtxWithAnswer"),
        )
        .state(StateBuilder::atomic(QUESTION).entry(ask))
        .state(StateBuilder::atomic(ERROR))
        .state(StateBuilder::atomic(NO_RESULTS))
        .state(
            StateBuilder::atomic(PENDING)
                .invoke(service, service)
                .on_invoke_done(
                    TransitionBuilder::to(DONE)
                        .guard(found)
                        .action("updateCtxWithResults"),
                )
                .on_invoke_done(TransitionBuilder::to(NO_RESULTS))
                .on_invoke_error(TransitionBuilder::to(ERROR)),
        )
        .state(StateBuilder::final_state(DONE))
        .on_done(next)
}

/// The support flow chart.
pub fn chart() -> Result<StateChart, BuildError> {
    ChartBuilder::new(FLOW_ID)
        .initial(INTRO)
        .state(
            StateBuilder::compound(INTRO)
                .initial(QUESTION)
                .transition(
                    TransitionBuilder::to(NEW_TICKET)
                        .event(ANSWER_USER)
                        .guard("shouldCreateNewTicket")
                        .action("updateCtxWithAnswer"),
                )
                .transition(
                    TransitionBuilder::to(FIND_TICKET)
                        .event(ANSWER_USER)
                        .guard("shouldFindTicket")
                        .action("updateCtxWithAnswer"),
                )
                .state(StateBuilder::atomic(QUESTION).entry("askIntroQuestion")),
        )
        .state(lookup_region(NEW_TICKET, "askNewTicket", "getPeripheral", "hasItems", ITEM_ORDERED))
        .state(lookup_region(FIND_TICKET, "askFindTicket", "getTicket", "foundTicket", PING_TICKET))
        .state(
            StateBuilder::compound(PING_TICKET)
                .initial(SHOULD_SKIP)
                .transition(
                    TransitionBuilder::to(format!(".{DONE}"))
                        .event(ANSWER_USER)
                        .guard("shouldSendPing")
                        .action("updateCtxWithAnswer"),
                )
                .transition(
                    TransitionBuilder::to(format!(".{SKIPPED}"))
                        .event(ANSWER_USER)
                        .action("skipPing"),
                )
                .state(
                    StateBuilder::atomic(SHOULD_SKIP)
                        .always(TransitionBuilder::to(QUESTION).guard("shouldAskPingTicket"))
                        .always(TransitionBuilder::to(DONE)),
                )
                .state(StateBuilder::atomic(QUESTION).entry("askPingTicket"))
                .state(StateBuilder::atomic(DONE))
                .state(StateBuilder::atomic(SKIPPED)),
        )
        .state(StateBuilder::atomic(ITEM_ORDERED))
        .build()
}

/// The flow chart paired with its guards, actions and lookup services.
pub fn machine(lookup: LookupConfig) -> Result<Arc<Machine<FlowContext>>, BuildError> {
    Machine::shared(chart()?, handlers::implementations(lookup))
}

/// Start a conversation with an empty context and default settings.
pub fn configure() -> Result<SessionHandle<FlowContext>, EngineError> {
    configure_with(LookupConfig::default(), SessionConfig::default())
}

/// Start a conversation with explicit lookup and session settings.
pub fn configure_with(
    lookup: LookupConfig,
    config: SessionConfig,
) -> Result<SessionHandle<FlowContext>, EngineError> {
    let machine = machine(lookup)?;
    SessionHandle::spawn(machine, FlowContext::default(), config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpreter::Interpreter;

    #[test]
    fn chart_builds_with_all_implementations() {
        let machine = machine(LookupConfig::immediate()).unwrap();
        let chart = machine.chart();
        assert_eq!(chart.id(), FLOW_ID);
        for outcome in OUTCOMES {
            assert!(chart.find(outcome).is_some(), "missing {outcome}");
        }
    }

    #[test]
    fn regions_complete_into_the_next_step() {
        let chart = chart().unwrap();
        let new_ticket = chart.find(NEW_TICKET).unwrap();
        let find_ticket = chart.find(FIND_TICKET).unwrap();
        assert_eq!(chart.on_done_target(new_ticket), chart.find(ITEM_ORDERED));
        assert_eq!(chart.on_done_target(find_ticket), chart.find(PING_TICKET));
    }

    #[test]
    fn question_table_covers_asking_states() {
        for key in [INTRO, NEW_TICKET, FIND_TICKET, PING_TICKET] {
            let entry = question_for(key).unwrap();
            assert_eq!(entry.key, key);
            assert!(entry.answer.is_none());
        }
        assert!(question_for(ITEM_ORDERED).is_none());
    }

    #[test]
    fn starts_by_asking_the_intro_question() {
        let mut interpreter = Interpreter::new(machine(LookupConfig::immediate()).unwrap());
        let snapshot = interpreter.start(FlowContext::default()).unwrap();

        assert_eq!(snapshot.value, vec![INTRO, QUESTION]);
        assert_eq!(snapshot.context.chat, vec![question_for(INTRO).unwrap()]);
    }

    #[test]
    fn unclassified_intro_answer_is_ignored() {
        let mut interpreter = Interpreter::new(machine(LookupConfig::immediate()).unwrap());
        let before = interpreter.start(FlowContext::default()).unwrap();

        let after = interpreter.send(answer(INTRO, "chit_chat")).unwrap();

        assert_eq!(before, after);
    }
}
