//! Chat stream reducer.
//!
//! A pure transition function: current snapshot in, next snapshot out. All
//! mutation of chat state funnels through here; render code only ever sees
//! the returned value. Rules that keep the document consistent under
//! out-of-order and duplicate delivery:
//!
//! - id lists and their sibling maps stay paired on every upsert
//! - at most one child of a message is loading at a time; a new in-flight
//!   entity settles whatever was streaming before it
//! - status transitions are monotonic; deltas targeting a finished entity or
//!   a terminated message are dropped with a warning
//! - stream termination closes out every still-loading child

use prism_protocol::{
    ChatEvent, FileArtifact, FileContent, ModifiedRange, ReasoningStep, ResponseMessage,
    StepStatus, StreamOutcome, StreamProgress,
};
use tracing::{debug, warn};

use crate::chat::model::{ChatMeta, ChatState, MessageState};

/// Apply one event, producing the next snapshot.
pub fn reduce(mut state: ChatState, event: &ChatEvent) -> ChatState {
    if event.chat_id() != state.chat.id {
        warn!("event for chat {} does not match chat {}, ignoring", event.chat_id(), state.chat.id);
        return state;
    }

    match event {
        ChatEvent::TitleDelta {
            title,
            title_chunk,
            progress,
            ..
        } => {
            apply_title(&mut state.chat, title, title_chunk, *progress);
        }

        ChatEvent::ResponseDelta {
            message_id,
            response_message,
            ..
        } => {
            let message = ensure_message(&mut state, message_id);
            if message.is_completed_stream {
                warn!("response delta for terminated message {message_id}, dropping");
            } else {
                upsert_response(message, response_message);
            }
        }

        ChatEvent::ReasoningDelta {
            message_id,
            reasoning,
            ..
        } => {
            let message = ensure_message(&mut state, message_id);
            if message.is_completed_stream {
                warn!("reasoning delta for terminated message {message_id}, dropping");
            } else {
                upsert_reasoning(message, reasoning);
            }
        }

        ChatEvent::FileDelta {
            message_id,
            reasoning_id,
            file,
            ..
        } => {
            let message = ensure_message(&mut state, message_id);
            if message.is_completed_stream {
                warn!("file delta for terminated message {message_id}, dropping");
            } else {
                apply_file_delta(message, reasoning_id, file);
            }
        }

        ChatEvent::StreamTerminated {
            message_id, outcome, ..
        } => {
            let message = ensure_message(&mut state, message_id);
            terminate(message, *outcome);
        }
    }

    state
}

// ============================================================================
// Title
// ============================================================================

fn apply_title(chat: &mut ChatMeta, title: &str, title_chunk: &str, progress: StreamProgress) {
    match progress {
        StreamProgress::InProgress => {
            if !title_chunk.is_empty() {
                chat.title.push_str(title_chunk);
            }
        }
        StreamProgress::Completed => {
            // An empty final title keeps whatever accumulated.
            if !title.is_empty() {
                chat.title = title.to_string();
            }
        }
    }
}

// ============================================================================
// Messages
// ============================================================================

/// Deltas can outrun the message they belong to; seed a shell so transcript
/// order survives.
fn ensure_message<'a>(state: &'a mut ChatState, message_id: &str) -> &'a mut MessageState {
    let ChatState { chat, messages } = state;
    messages.entry(message_id.to_string()).or_insert_with(|| {
        chat.message_ids.push(message_id.to_string());
        MessageState::shell(message_id, chat.updated_at)
    })
}

/// A new in-flight entity means whatever was streaming before it is done:
/// settle every other loading child so only one is ever live.
fn settle_siblings(message: &mut MessageState, except_id: &str) {
    for step in message.reasoning_messages.values_mut() {
        if step.id() == except_id {
            continue;
        }
        if step.status() == StepStatus::Loading {
            step.set_status(StepStatus::Completed);
            if let ReasoningStep::Files { files, .. } = step {
                for artifact in files.values_mut() {
                    if artifact.status == StepStatus::Loading {
                        artifact.status = StepStatus::Completed;
                    }
                }
            }
        }
    }

    for response in message.response_messages.values_mut() {
        if response.id() == except_id {
            continue;
        }
        if let ResponseMessage::Text {
            is_final_message,
            message_chunk,
            ..
        } = response
            && !*is_final_message
        {
            *is_final_message = true;
            *message_chunk = None;
        }
    }
}

// ============================================================================
// Response messages
// ============================================================================

fn upsert_response(message: &mut MessageState, incoming: &ResponseMessage) {
    let id = incoming.id().to_string();

    if let Some(ResponseMessage::Text {
        is_final_message: true,
        ..
    }) = message.response_messages.get(&id)
    {
        warn!("delta for finalized response {id}, dropping");
        return;
    }

    settle_siblings(message, &id);

    match message.response_messages.get_mut(&id) {
        Some(existing) => merge_response(existing, incoming),
        None => {
            message.response_message_ids.push(id.clone());
            message
                .response_messages
                .insert(id, sanitized_response(incoming));
        }
    }
}

fn merge_response(existing: &mut ResponseMessage, incoming: &ResponseMessage) {
    match (existing, incoming) {
        (
            ResponseMessage::Text {
                message,
                message_chunk,
                is_final_message,
                ..
            },
            ResponseMessage::Text {
                message: incoming_message,
                message_chunk: incoming_chunk,
                is_final_message: incoming_final,
                ..
            },
        ) => {
            if let Some(chunk) = incoming_chunk {
                message.push_str(chunk);
            } else if !incoming_message.is_empty() {
                *message = incoming_message.clone();
            }
            // Final is sticky.
            *is_final_message = *is_final_message || *incoming_final;
            *message_chunk = None;
        }
        (existing, incoming) => {
            *existing = sanitized_response(incoming);
        }
    }
}

/// Fold a transient chunk into the accumulated text before storing.
fn sanitized_response(incoming: &ResponseMessage) -> ResponseMessage {
    let mut fresh = incoming.clone();
    if let ResponseMessage::Text {
        message,
        message_chunk,
        ..
    } = &mut fresh
        && let Some(chunk) = message_chunk.take()
    {
        if message.is_empty() {
            *message = chunk;
        } else {
            message.push_str(&chunk);
        }
    }
    fresh
}

// ============================================================================
// Reasoning steps
// ============================================================================

fn upsert_reasoning(message: &mut MessageState, incoming: &ReasoningStep) {
    let id = incoming.id().to_string();

    if let Some(existing) = message.reasoning_messages.get(&id)
        && existing.status().is_terminal()
    {
        warn!("delta for finished reasoning step {id}, dropping");
        return;
    }

    settle_siblings(message, &id);

    match message.reasoning_messages.get_mut(&id) {
        Some(existing) => merge_reasoning(existing, incoming),
        None => {
            message.reasoning_message_ids.push(id.clone());
            message
                .reasoning_messages
                .insert(id, sanitized_reasoning(incoming));
        }
    }
}

fn merge_reasoning(existing: &mut ReasoningStep, incoming: &ReasoningStep) {
    match (existing, incoming) {
        (
            ReasoningStep::Text {
                title,
                secondary_title,
                status,
                message,
                message_chunk,
                ..
            },
            ReasoningStep::Text {
                title: incoming_title,
                secondary_title: incoming_secondary,
                status: incoming_status,
                message: incoming_message,
                message_chunk: incoming_chunk,
                ..
            },
        ) => {
            if let Some(chunk) = incoming_chunk {
                message.push_str(chunk);
            } else if !incoming_message.is_empty() {
                *message = incoming_message.clone();
            }
            *message_chunk = None;
            *title = incoming_title.clone();
            *secondary_title = incoming_secondary.clone();
            *status = *incoming_status;
        }

        (
            ReasoningStep::Pills {
                title,
                secondary_title,
                status,
                pill_containers,
                ..
            },
            ReasoningStep::Pills {
                title: incoming_title,
                secondary_title: incoming_secondary,
                status: incoming_status,
                pill_containers: incoming_containers,
                ..
            },
        ) => {
            // Containers are replaced wholesale on each delta.
            *pill_containers = incoming_containers.clone();
            *title = incoming_title.clone();
            *secondary_title = incoming_secondary.clone();
            *status = *incoming_status;
        }

        (
            ReasoningStep::Files {
                title,
                secondary_title,
                status,
                file_ids,
                files,
                ..
            },
            ReasoningStep::Files {
                title: incoming_title,
                secondary_title: incoming_secondary,
                status: incoming_status,
                file_ids: incoming_ids,
                files: incoming_files,
                ..
            },
        ) => {
            for file_id in incoming_ids {
                if let Some(artifact) = incoming_files.get(file_id) {
                    upsert_artifact(file_ids, files, artifact);
                }
            }
            *title = incoming_title.clone();
            *secondary_title = incoming_secondary.clone();
            *status = *incoming_status;
        }

        (existing, incoming) => {
            warn!("reasoning step {} changed shape mid-stream, replacing", incoming.id());
            *existing = sanitized_reasoning(incoming);
        }
    }
}

fn sanitized_reasoning(incoming: &ReasoningStep) -> ReasoningStep {
    let mut fresh = incoming.clone();
    match &mut fresh {
        ReasoningStep::Text {
            message,
            message_chunk,
            ..
        } => {
            if let Some(chunk) = message_chunk.take() {
                if message.is_empty() {
                    *message = chunk;
                } else {
                    message.push_str(&chunk);
                }
            }
        }
        ReasoningStep::Files { files, .. } => {
            for artifact in files.values_mut() {
                fold_chunk(artifact);
            }
        }
        ReasoningStep::Pills { .. } => {}
    }
    fresh
}

// ============================================================================
// File artifacts
// ============================================================================

fn apply_file_delta(message: &mut MessageState, reasoning_id: &str, incoming: &FileArtifact) {
    match message.reasoning_messages.get(reasoning_id) {
        Some(ReasoningStep::Files { status, .. }) if !status.is_terminal() => {}
        Some(ReasoningStep::Files { .. }) => {
            warn!("file delta for finished reasoning step {reasoning_id}, dropping");
            return;
        }
        Some(_) => {
            warn!("file delta for non-files reasoning step {reasoning_id}, dropping");
            return;
        }
        None => {
            warn!("file delta for unknown reasoning step {reasoning_id}, dropping");
            return;
        }
    }

    settle_siblings(message, reasoning_id);
    if let Some(ReasoningStep::Files {
        file_ids, files, ..
    }) = message.reasoning_messages.get_mut(reasoning_id)
    {
        upsert_artifact(file_ids, files, incoming);
    }
}

fn upsert_artifact(
    file_ids: &mut Vec<String>,
    files: &mut std::collections::HashMap<String, FileArtifact>,
    incoming: &FileArtifact,
) {
    match files.get_mut(&incoming.id) {
        Some(existing) => {
            if existing.status.is_terminal() {
                warn!("delta for finished file artifact {}, dropping", incoming.id);
                return;
            }
            apply_file_content(existing, incoming);
            existing.status = incoming.status;
            existing.file_name = incoming.file_name.clone();
            existing.version_number = incoming.version_number;
        }
        None => {
            if !file_ids.contains(&incoming.id) {
                file_ids.push(incoming.id.clone());
            }
            let mut fresh = incoming.clone();
            fold_chunk(&mut fresh);
            files.insert(incoming.id.clone(), fresh);
        }
    }
}

fn apply_file_content(existing: &mut FileArtifact, incoming: &FileArtifact) {
    let Some(incoming_content) = &incoming.file else {
        return;
    };
    let content = existing.file.get_or_insert_with(|| FileContent {
        text: String::new(),
        text_chunk: None,
        modified: None,
    });

    if let Some(chunk) = &incoming_content.text_chunk {
        if content.text.is_empty() {
            content.text = chunk.clone();
        } else {
            content.text.push_str(chunk);
        }
    } else if let Some(ranges) = &incoming_content.modified {
        splice_ranges(&mut content.text, &incoming_content.text, ranges);
    } else if !incoming_content.text.is_empty() {
        // Full-text replace; content never shrinks while still streaming.
        if existing.status == StepStatus::Loading
            && incoming_content.text.len() < content.text.len()
        {
            warn!("full-text replace would shrink streaming file {}, dropping", existing.id);
        } else {
            content.text = incoming_content.text.clone();
        }
    }

    if incoming_content.modified.is_some() {
        content.modified = incoming_content.modified.clone();
    }
    content.text_chunk = None;
}

fn fold_chunk(artifact: &mut FileArtifact) {
    if let Some(content) = &mut artifact.file
        && let Some(chunk) = content.text_chunk.take()
    {
        if content.text.is_empty() {
            content.text = chunk;
        } else {
            content.text.push_str(&chunk);
        }
    }
}

/// Splice each `[start, end)` span of the incoming text over the current
/// text. Used for non-append edits such as mid-stream corrections.
fn splice_ranges(current: &mut String, incoming: &str, ranges: &[ModifiedRange]) {
    for &(start, end) in ranges {
        let Some(replacement) = incoming.get(start..end.min(incoming.len())) else {
            warn!("modified range {start}..{end} is not addressable, skipping");
            continue;
        };
        if start >= current.len() {
            current.push_str(replacement);
            continue;
        }
        let splice_end = end.min(current.len());
        if current.is_char_boundary(start) && current.is_char_boundary(splice_end) {
            current.replace_range(start..splice_end, replacement);
        } else {
            warn!("modified range {start}..{end} splits a character, skipping");
        }
    }
}

// ============================================================================
// Termination
// ============================================================================

fn terminate(message: &mut MessageState, outcome: StreamOutcome) {
    if message.is_completed_stream {
        debug!("duplicate stream termination for message {}, ignoring", message.id);
        return;
    }

    let closing_status = match outcome {
        StreamOutcome::Success => StepStatus::Completed,
        StreamOutcome::Error => StepStatus::Failed,
    };

    for step in message.reasoning_messages.values_mut() {
        if step.status() == StepStatus::Loading {
            step.set_status(closing_status);
        }
        if let ReasoningStep::Files { files, .. } = step {
            for artifact in files.values_mut() {
                if artifact.status == StepStatus::Loading {
                    artifact.status = closing_status;
                }
            }
        }
    }

    for response in message.response_messages.values_mut() {
        if let ResponseMessage::Text {
            is_final_message,
            message_chunk,
            ..
        } = response
            && !*is_final_message
        {
            *is_final_message = true;
            *message_chunk = None;
        }
    }

    message.is_completed_stream = true;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::collections::HashMap;

    fn live_state() -> ChatState {
        let now = Utc::now();
        let mut messages = HashMap::new();
        messages.insert("m1".to_string(), MessageState::shell("m1", now));

        ChatState {
            chat: ChatMeta {
                id: "c-1".to_string(),
                title: "Untitled".to_string(),
                is_favorited: false,
                is_new_chat: true,
                message_ids: vec!["m1".to_string()],
                created_at: now,
                updated_at: now,
                created_by_id: "u-1".to_string(),
                created_by_name: "Dana".to_string(),
                created_by_avatar: None,
            },
            messages,
        }
    }

    fn text_reasoning(id: &str, chunk: &str, status: StepStatus) -> ChatEvent {
        ChatEvent::ReasoningDelta {
            chat_id: "c-1".to_string(),
            message_id: "m1".to_string(),
            reasoning: ReasoningStep::Text {
                id: id.to_string(),
                title: "Thinking".to_string(),
                secondary_title: None,
                status,
                message: String::new(),
                message_chunk: Some(chunk.to_string()),
            },
        }
    }

    fn files_reasoning(step_id: &str, artifact: FileArtifact) -> ChatEvent {
        let mut files = HashMap::new();
        let file_id = artifact.id.clone();
        files.insert(file_id.clone(), artifact);
        ChatEvent::ReasoningDelta {
            chat_id: "c-1".to_string(),
            message_id: "m1".to_string(),
            reasoning: ReasoningStep::Files {
                id: step_id.to_string(),
                title: "Creating files".to_string(),
                secondary_title: None,
                status: StepStatus::Loading,
                file_ids: vec![file_id],
                files,
            },
        }
    }

    fn artifact(id: &str, text: &str, chunk: Option<&str>) -> FileArtifact {
        FileArtifact {
            id: id.to_string(),
            file_type: prism_protocol::FileKind::Metric,
            file_name: format!("{id}.yml"),
            version_number: 1,
            status: StepStatus::Loading,
            file: Some(FileContent {
                text: text.to_string(),
                text_chunk: chunk.map(str::to_string),
                modified: None,
            }),
        }
    }

    fn terminated(outcome: StreamOutcome) -> ChatEvent {
        ChatEvent::StreamTerminated {
            chat_id: "c-1".to_string(),
            message_id: "m1".to_string(),
            outcome,
        }
    }

    fn step(state: &ChatState, id: &str) -> ReasoningStep {
        state.messages["m1"].reasoning_messages[id].clone()
    }

    #[test]
    fn test_title_chunks_accumulate_then_freeze() {
        let mut state = live_state();
        state.chat.title = String::new();

        for (chunk, progress) in [
            ("Quarterly", StreamProgress::InProgress),
            (" revenue", StreamProgress::InProgress),
        ] {
            state = reduce(
                state,
                &ChatEvent::TitleDelta {
                    chat_id: "c-1".to_string(),
                    message_id: "m1".to_string(),
                    title: String::new(),
                    title_chunk: chunk.to_string(),
                    progress,
                },
            );
        }
        assert_eq!(state.chat.title, "Quarterly revenue");

        state = reduce(
            state,
            &ChatEvent::TitleDelta {
                chat_id: "c-1".to_string(),
                message_id: "m1".to_string(),
                title: "Quarterly revenue deep dive".to_string(),
                title_chunk: String::new(),
                progress: StreamProgress::Completed,
            },
        );
        assert_eq!(state.chat.title, "Quarterly revenue deep dive");
    }

    #[test]
    fn test_empty_completed_title_keeps_accumulated_text() {
        let mut state = live_state();
        state.chat.title = "Accumulated".to_string();

        state = reduce(
            state,
            &ChatEvent::TitleDelta {
                chat_id: "c-1".to_string(),
                message_id: "m1".to_string(),
                title: String::new(),
                title_chunk: String::new(),
                progress: StreamProgress::Completed,
            },
        );
        assert_eq!(state.chat.title, "Accumulated");
    }

    #[test]
    fn test_response_text_chunks_accumulate() {
        let mut state = live_state();
        for chunk in ["Revenue", " grew", " 12%."] {
            state = reduce(
                state,
                &ChatEvent::ResponseDelta {
                    chat_id: "c-1".to_string(),
                    message_id: "m1".to_string(),
                    response_message: ResponseMessage::Text {
                        id: "resp-1".to_string(),
                        message: String::new(),
                        message_chunk: Some(chunk.to_string()),
                        is_final_message: false,
                    },
                },
            );
        }

        match &state.messages["m1"].response_messages["resp-1"] {
            ResponseMessage::Text { message, .. } => assert_eq!(message, "Revenue grew 12%."),
            other => panic!("unexpected response: {other:?}"),
        }
        assert_eq!(
            state.messages["m1"].response_message_ids,
            vec!["resp-1".to_string()]
        );
    }

    #[test]
    fn test_new_response_settles_loading_reasoning() {
        let mut state = live_state();
        state = reduce(state, &text_reasoning("r1", "exploring", StepStatus::Loading));
        assert_eq!(step(&state, "r1").status(), StepStatus::Loading);

        state = reduce(
            state,
            &ChatEvent::ResponseDelta {
                chat_id: "c-1".to_string(),
                message_id: "m1".to_string(),
                response_message: ResponseMessage::Text {
                    id: "resp-1".to_string(),
                    message: String::new(),
                    message_chunk: Some("Answer".to_string()),
                    is_final_message: false,
                },
            },
        );

        assert_eq!(step(&state, "r1").status(), StepStatus::Completed);
        assert!(state.check_consistency().is_ok());
    }

    #[test]
    fn test_new_reasoning_step_settles_previous_one() {
        let mut state = live_state();
        state = reduce(state, &text_reasoning("r1", "first", StepStatus::Loading));
        state = reduce(state, &text_reasoning("r2", "second", StepStatus::Loading));

        assert_eq!(step(&state, "r1").status(), StepStatus::Completed);
        assert_eq!(step(&state, "r2").status(), StepStatus::Loading);
        assert_eq!(
            state.messages["m1"].reasoning_message_ids,
            vec!["r1".to_string(), "r2".to_string()]
        );
        assert!(state.check_consistency().is_ok());
    }

    #[test]
    fn test_reasoning_chunks_accumulate_across_deltas() {
        let mut state = live_state();
        for chunk in ["Hello", ", how", " are you?"] {
            state = reduce(state, &text_reasoning("r1", chunk, StepStatus::Loading));
        }

        match step(&state, "r1") {
            ReasoningStep::Text { message, .. } => assert_eq!(message, "Hello, how are you?"),
            other => panic!("unexpected step: {other:?}"),
        }
    }

    #[test]
    fn test_terminal_reasoning_status_is_monotonic() {
        let mut state = live_state();
        state = reduce(state, &text_reasoning("r1", "done", StepStatus::Completed));

        // A straggler claiming the step is loading again must not reopen it.
        state = reduce(state, &text_reasoning("r1", " more", StepStatus::Loading));

        match step(&state, "r1") {
            ReasoningStep::Text {
                message, status, ..
            } => {
                assert_eq!(status, StepStatus::Completed);
                assert_eq!(message, "done");
            }
            other => panic!("unexpected step: {other:?}"),
        }
    }

    #[test]
    fn test_file_delta_appends_chunk() {
        let mut state = live_state();
        state = reduce(state, &files_reasoning("r1", artifact("f1", "line one", None)));

        state = reduce(
            state,
            &ChatEvent::FileDelta {
                chat_id: "c-1".to_string(),
                message_id: "m1".to_string(),
                reasoning_id: "r1".to_string(),
                file: artifact("f1", "", Some("\nline two")),
            },
        );

        match step(&state, "r1") {
            ReasoningStep::Files { files, .. } => {
                let content = files["f1"].file.as_ref().unwrap();
                assert_eq!(content.text, "line one\nline two");
            }
            other => panic!("unexpected step: {other:?}"),
        }
    }

    #[test]
    fn test_file_delta_splices_modified_ranges() {
        let mut state = live_state();
        state = reduce(state, &files_reasoning("r1", artifact("f1", "total: 100", None)));

        let mut corrected = artifact("f1", "total: 250", None);
        corrected.file.as_mut().unwrap().modified = Some(vec![(7, 10)]);

        state = reduce(
            state,
            &ChatEvent::FileDelta {
                chat_id: "c-1".to_string(),
                message_id: "m1".to_string(),
                reasoning_id: "r1".to_string(),
                file: corrected,
            },
        );

        match step(&state, "r1") {
            ReasoningStep::Files { files, .. } => {
                let content = files["f1"].file.as_ref().unwrap();
                assert_eq!(content.text, "total: 250");
                assert_eq!(content.modified, Some(vec![(7, 10)]));
            }
            other => panic!("unexpected step: {other:?}"),
        }
    }

    #[test]
    fn test_finished_file_artifact_is_frozen() {
        let mut state = live_state();
        let mut done = artifact("f1", "final content", None);
        done.status = StepStatus::Completed;
        state = reduce(state, &files_reasoning("r1", done));

        state = reduce(
            state,
            &ChatEvent::FileDelta {
                chat_id: "c-1".to_string(),
                message_id: "m1".to_string(),
                reasoning_id: "r1".to_string(),
                file: artifact("f1", "", Some(" extra")),
            },
        );

        match step(&state, "r1") {
            ReasoningStep::Files { files, .. } => {
                assert_eq!(files["f1"].file.as_ref().unwrap().text, "final content");
                assert_eq!(files["f1"].status, StepStatus::Completed);
            }
            other => panic!("unexpected step: {other:?}"),
        }
    }

    #[test]
    fn test_file_delta_for_unknown_step_is_dropped() {
        let state = live_state();
        let before = state.clone();

        let after = reduce(
            state,
            &ChatEvent::FileDelta {
                chat_id: "c-1".to_string(),
                message_id: "m1".to_string(),
                reasoning_id: "r-missing".to_string(),
                file: artifact("f1", "content", None),
            },
        );

        assert_eq!(after, before);
    }

    #[test]
    fn test_termination_completes_loading_children() {
        let mut state = live_state();
        state = reduce(state, &files_reasoning("r1", artifact("f1", "content", None)));
        state = reduce(state, &terminated(StreamOutcome::Success));

        let message = &state.messages["m1"];
        assert!(message.is_completed_stream);
        assert_eq!(step(&state, "r1").status(), StepStatus::Completed);
        match step(&state, "r1") {
            ReasoningStep::Files { files, .. } => {
                assert_eq!(files["f1"].status, StepStatus::Completed);
            }
            other => panic!("unexpected step: {other:?}"),
        }
        assert!(state.check_consistency().is_ok());
    }

    #[test]
    fn test_error_termination_fails_loading_children() {
        let mut state = live_state();
        state = reduce(state, &text_reasoning("r1", "working", StepStatus::Loading));
        state = reduce(state, &terminated(StreamOutcome::Error));

        assert_eq!(step(&state, "r1").status(), StepStatus::Failed);
        assert!(state.messages["m1"].is_completed_stream);
    }

    #[test]
    fn test_duplicate_termination_is_idempotent() {
        let mut state = live_state();
        state = reduce(state, &text_reasoning("r1", "working", StepStatus::Loading));
        state = reduce(state, &terminated(StreamOutcome::Success));
        let settled = state.clone();

        // A late error termination must not flip completed children to failed.
        state = reduce(state, &terminated(StreamOutcome::Error));
        assert_eq!(state, settled);
    }

    #[test]
    fn test_deltas_after_termination_are_dropped() {
        let mut state = live_state();
        state = reduce(state, &terminated(StreamOutcome::Success));
        let closed = state.clone();

        state = reduce(state, &text_reasoning("r1", "late", StepStatus::Loading));
        assert_eq!(state, closed);
    }

    #[test]
    fn test_event_for_another_chat_is_ignored() {
        let state = live_state();
        let before = state.clone();

        let after = reduce(
            state,
            &ChatEvent::StreamTerminated {
                chat_id: "c-other".to_string(),
                message_id: "m1".to_string(),
                outcome: StreamOutcome::Success,
            },
        );
        assert_eq!(after, before);
    }

    #[test]
    fn test_delta_for_unknown_message_creates_shell() {
        let mut state = live_state();
        state = reduce(
            state,
            &ChatEvent::ResponseDelta {
                chat_id: "c-1".to_string(),
                message_id: "m2".to_string(),
                response_message: ResponseMessage::Text {
                    id: "resp-1".to_string(),
                    message: String::new(),
                    message_chunk: Some("follow-up".to_string()),
                    is_final_message: false,
                },
            },
        );

        assert!(state.messages.contains_key("m2"));
        assert_eq!(
            state.chat.message_ids,
            vec!["m1".to_string(), "m2".to_string()]
        );
        assert!(state.check_consistency().is_ok());
    }

    #[test]
    fn test_file_response_is_replaced_wholesale() {
        let mut state = live_state();
        for version in 1..=2u32 {
            state = reduce(
                state,
                &ChatEvent::ResponseDelta {
                    chat_id: "c-1".to_string(),
                    message_id: "m1".to_string(),
                    response_message: ResponseMessage::File {
                        id: "resp-file".to_string(),
                        file_type: prism_protocol::FileKind::Dashboard,
                        file_name: "ops.dash".to_string(),
                        version_number: version,
                        metadata: None,
                    },
                },
            );
        }

        match &state.messages["m1"].response_messages["resp-file"] {
            ResponseMessage::File { version_number, .. } => assert_eq!(*version_number, 2),
            other => panic!("unexpected response: {other:?}"),
        }
    }
}
