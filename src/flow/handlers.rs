//! Guards, actions and services of the support flow.

use super::context::{Answer, ChatEntry, FlowContext, LookupResult, Query};
use super::lookup::{self, LookupConfig};
use super::{question_for, FIND_TICKET, INTRO, NEW_TICKET, PING_TICKET};
use crate::core::{Event, GuardError, Implementations};

/// Every guard, action and service the flow chart references.
pub fn implementations(config: LookupConfig) -> Implementations<FlowContext> {
    Implementations::<FlowContext>::new()
        .guard("shouldCreateNewTicket", |_, event| answer_is(event, "new_ticket"))
        .guard("shouldFindTicket", |_, event| answer_is(event, "find_ticket"))
        .guard("shouldSendPing", |_, event| answer_is(event, "ping_order"))
        .guard_fn("shouldAskPingTicket", |ctx, _| should_ask_ping_ticket(ctx))
        .guard("hasItems", |_, event| has_items(event))
        .guard("foundTicket", |_, event| found_ticket(event))
        .action("updateCtxWithAnswer", update_ctx_with_answer)
        .action("updateCtxWithResults", update_ctx_with_results)
        .action("askIntroQuestion", |ctx, _| ask_question(ctx, INTRO))
        .action("askNewTicket", |ctx, _| ask_question(ctx, NEW_TICKET))
        .action("askFindTicket", |ctx, _| ask_question(ctx, FIND_TICKET))
        .action("askPingTicket", |ctx, _| ask_question(ctx, PING_TICKET))
        .action("skipPing", |ctx, _| skip_ping(ctx))
        .service("getPeripheral", move |ctx: &FlowContext| {
            lookup::peripheral(ctx.query.peripheral.clone(), config)
        })
        .service("getTicket", move |ctx: &FlowContext| {
            lookup::ticket(ctx.query.ticket.clone(), config)
        })
}

fn read_answer(event: &Event) -> Result<Answer, GuardError> {
    event
        .data_as()
        .map_err(|e| GuardError::new(format!("'{}' carries no answer: {e}", event.name)))
}

fn answer_is(event: &Event, expected: &str) -> Result<bool, GuardError> {
    Ok(read_answer(event)?.value == expected)
}

fn should_ask_ping_ticket(ctx: &FlowContext) -> bool {
    !ctx.results.pinged.unwrap_or(false)
}

/// Lookup payloads that do not fit [`LookupResult`] are rejected here, before
/// the results action could store them.
fn read_results(event: &Event) -> Result<LookupResult, GuardError> {
    event
        .data_as()
        .map_err(|e| GuardError::new(format!("'{}' carries a malformed lookup result: {e}", event.name)))
}

fn has_items(event: &Event) -> Result<bool, GuardError> {
    Ok(read_results(event)?.count.is_some_and(|count| count > 0))
}

fn found_ticket(event: &Event) -> Result<bool, GuardError> {
    Ok(read_results(event)?.item.is_some_and(|item| !item.is_empty()))
}

/// Record the answer in the transcript and derive the next query from it.
fn update_ctx_with_answer(ctx: &FlowContext, event: &Event) -> FlowContext {
    let Ok(answer) = event.data_as::<Answer>() else {
        tracing::warn!(event = %event.name, "Answer action received no answer data");
        return ctx.clone();
    };
    let query = match answer.key.as_str() {
        NEW_TICKET => Query {
            peripheral: Some(answer.value.clone()),
            ..Query::default()
        },
        FIND_TICKET => Query {
            ticket: Some(answer.value.clone()),
            ..Query::default()
        },
        _ => Query::default(),
    };
    FlowContext {
        query,
        chat: answer_chat(&ctx.chat, &answer.key, &answer.label),
        ..ctx.clone()
    }
}

fn update_ctx_with_results(ctx: &FlowContext, event: &Event) -> FlowContext {
    match event.data_as::<LookupResult>() {
        Ok(results) => FlowContext {
            results,
            ..ctx.clone()
        },
        Err(e) => {
            tracing::error!(event = %event.name, error = %e, "Lookup result has an unexpected shape");
            ctx.clone()
        }
    }
}

fn ask_question(ctx: &FlowContext, key: &str) -> FlowContext {
    let mut chat = ctx.chat.clone();
    chat.extend(question_for(key));
    FlowContext {
        chat,
        ..ctx.clone()
    }
}

fn skip_ping(ctx: &FlowContext) -> FlowContext {
    FlowContext {
        chat: answer_chat(&ctx.chat, PING_TICKET, "No"),
        ..ctx.clone()
    }
}

fn answer_chat(chat: &[ChatEntry], key: &str, label: &str) -> Vec<ChatEntry> {
    chat.iter()
        .map(|entry| {
            if entry.key == key {
                ChatEntry {
                    answer: Some(label.to_string()),
                    ..entry.clone()
                }
            } else {
                entry.clone()
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flow::context::answer;
    use serde_json::{json, Value};

    fn asked(keys: &[&str]) -> FlowContext {
        keys.iter()
            .fold(FlowContext::default(), |ctx, key| ask_question(&ctx, key))
    }

    #[test]
    fn answer_guards_compare_values() {
        let event = answer(INTRO, "new_ticket");
        assert_eq!(answer_is(&event, "new_ticket"), Ok(true));
        assert_eq!(answer_is(&event, "find_ticket"), Ok(false));
    }

    #[test]
    fn answer_guard_without_answer_data_fails() {
        let err = answer_is(&Event::new("AnswerUser"), "new_ticket").unwrap_err();
        assert!(err.message().contains("AnswerUser"));
    }

    #[test]
    fn ping_question_is_asked_unless_pinged() {
        let mut ctx = FlowContext::default();
        assert!(should_ask_ping_ticket(&ctx));
        ctx.results.pinged = Some(false);
        assert!(should_ask_ping_ticket(&ctx));
        ctx.results.pinged = Some(true);
        assert!(!should_ask_ping_ticket(&ctx));
    }

    #[test]
    fn has_items_needs_a_positive_count() {
        let with = |data| Event::with_data("done.invoke.getPeripheral", data);
        assert_eq!(has_items(&with(json!({ "item": "monitor", "count": 23 }))), Ok(true));
        assert_eq!(has_items(&with(json!({ "item": "laptop", "count": 0 }))), Ok(false));
        assert_eq!(has_items(&with(json!({ "item": "laptop" }))), Ok(false));
    }

    #[test]
    fn found_ticket_needs_a_named_item() {
        let with = |item: Value| Event::with_data("done.invoke.getTicket", json!({ "item": item }));
        assert_eq!(found_ticket(&with(json!("monitor"))), Ok(true));
        assert_eq!(found_ticket(&with(json!(null))), Ok(false));
        assert_eq!(found_ticket(&with(json!(""))), Ok(false));
        assert_eq!(
            found_ticket(&Event::with_data("done.invoke.getTicket", json!({ "ticket": "400" }))),
            Ok(false)
        );
    }

    #[test]
    fn malformed_lookup_result_fails_the_guard() {
        let with = |data| Event::with_data("done.invoke.getTicket", data);
        let err = found_ticket(&with(json!({ "item": 1 }))).unwrap_err();
        assert!(err.message().contains("done.invoke.getTicket"));
        assert!(found_ticket(&with(json!({ "item": true }))).is_err());
        assert!(has_items(&with(json!({ "count": "many" }))).is_err());
        assert!(found_ticket(&Event::new("done.invoke.getTicket")).is_err());
    }

    #[test]
    fn malformed_results_keep_previous_context() {
        let mut ctx = FlowContext::default();
        ctx.results.pinged = Some(true);
        let event = Event::with_data("done.invoke.getTicket", json!({ "item": 7 }));

        assert_eq!(update_ctx_with_results(&ctx, &event), ctx);
    }

    #[test]
    fn answer_sets_query_and_fills_transcript() {
        let ctx = asked(&[INTRO, NEW_TICKET]);
        let event = Answer::new(NEW_TICKET, "monitor").with_label("A monitor").into_event();

        let next = update_ctx_with_answer(&ctx, &event);

        assert_eq!(next.query.peripheral.as_deref(), Some("monitor"));
        assert_eq!(next.query.ticket, None);
        assert_eq!(next.entry(NEW_TICKET).unwrap().answer.as_deref(), Some("A monitor"));
        assert_eq!(next.entry(INTRO).unwrap().answer, None);
    }

    #[test]
    fn answer_for_other_keys_resets_query() {
        let mut ctx = asked(&[INTRO]);
        ctx.query.ticket = Some("200".into());

        let next = update_ctx_with_answer(&ctx, &answer(INTRO, "find_ticket"));

        assert_eq!(next.query, Query::default());
        assert_eq!(next.entry(INTRO).unwrap().answer.as_deref(), Some("find_ticket"));
    }

    #[test]
    fn results_replace_previous_results() {
        let mut ctx = FlowContext::default();
        ctx.results.pinged = Some(true);
        let event = Event::with_data("done.invoke.getPeripheral", json!({ "item": "monitor", "count": 23 }));

        let next = update_ctx_with_results(&ctx, &event);

        assert_eq!(
            next.results,
            LookupResult {
                item: Some("monitor".into()),
                count: Some(23),
                ..LookupResult::default()
            }
        );
    }

    #[test]
    fn questions_are_appended_in_order() {
        let ctx = asked(&[INTRO, FIND_TICKET, PING_TICKET]);
        let keys: Vec<_> = ctx.chat.iter().map(|entry| entry.key.as_str()).collect();
        assert_eq!(keys, vec![INTRO, FIND_TICKET, PING_TICKET]);
        assert!(ctx.chat.iter().all(|entry| entry.answer.is_none()));
    }

    #[test]
    fn skip_ping_answers_no() {
        let ctx = asked(&[INTRO, FIND_TICKET, PING_TICKET]);
        let next = skip_ping(&ctx);
        assert_eq!(next.entry(PING_TICKET).unwrap().answer.as_deref(), Some("No"));
        assert_eq!(next.entry(FIND_TICKET).unwrap().answer, None);
    }
}
