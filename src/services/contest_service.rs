use std::{collections::HashSet, time::Duration};

use tokio::time::Instant;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    dao::question_bank::QuestionQuery,
    dto::contest::{CreateContestRequest, CreateContestResponse, StandingsResponse},
    error::ServiceError,
    services::{
        room_actor::{RoomHandle, spawn_room},
        token_service::VerifiedToken,
    },
    state::{
        SharedState,
        contest::Question,
        room::{Room, RoomInfo, RoomSettings},
    },
};

/// Everything needed to build a room.
#[derive(Debug, Clone)]
pub struct RoomBlueprint {
    /// Contest identifier.
    pub contest_id: String,
    /// Display name.
    pub name: String,
    /// Difficulty filter passed to the question source.
    pub difficulty: String,
    /// Number of questions wanted.
    pub question_count: usize,
    /// Overall time budget.
    pub duration_minutes: Option<u32>,
    /// Explicit problem-set ids, in play order.
    pub selected_question_ids: Vec<String>,
    /// Creator.
    pub host_user_id: String,
}

/// Create (or return) the room for a contest on behalf of `host`.
pub async fn create_contest(
    state: &SharedState,
    host: &VerifiedToken,
    request: CreateContestRequest,
) -> Result<CreateContestResponse, ServiceError> {
    let contest_id = request
        .contest_id
        .clone()
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    if host.authorize_contest(&contest_id).is_err() {
        return Err(ServiceError::Forbidden(format!(
            "token cannot create contest `{contest_id}`"
        )));
    }

    let rooms = &state.config().rooms;
    let blueprint = RoomBlueprint {
        contest_id: contest_id.clone(),
        name: request.name.trim().to_string(),
        difficulty: request.difficulty.trim().to_ascii_lowercase(),
        question_count: request
            .question_count
            .unwrap_or(rooms.default_question_count) as usize,
        duration_minutes: request.duration_minutes.or(rooms.default_duration_minutes),
        selected_question_ids: request.selected_question_ids,
        host_user_id: host.user_id.clone(),
    };

    let (handle, created) = state
        .registry()
        .get_or_create(&contest_id, || open_room(state, blueprint))
        .await?;

    if !created && handle.info().host_user_id != host.user_id {
        return Err(ServiceError::InvalidState(format!(
            "contest `{contest_id}` already exists for another host"
        )));
    }

    let lifecycle = handle.lifecycle();
    let message = if created {
        "Contest room created".to_string()
    } else {
        "Contest room already exists".to_string()
    };

    Ok(CreateContestResponse {
        contest_id: contest_id.clone(),
        name: handle.info().name.clone(),
        difficulty: handle.info().difficulty.clone(),
        question_count: handle.total_questions(),
        status: lifecycle.status,
        websocket_url: state.config().websocket_url(&contest_id),
        message,
    })
}

/// Load the question set and spawn a waiting room.
pub async fn open_room(state: &SharedState, blueprint: RoomBlueprint) -> Result<RoomHandle, ServiceError> {
    let explicit = !blueprint.selected_question_ids.is_empty();
    let query = QuestionQuery {
        contest_id: blueprint.contest_id.clone(),
        difficulty: Some(blueprint.difficulty.clone()),
        question_count: blueprint.question_count,
        selected_question_ids: blueprint.selected_question_ids.clone(),
    };

    let entities = state.questions().load(query).await.inspect_err(|err| {
        warn!(
            contest_id = %blueprint.contest_id,
            source = %state.questions().describe(),
            error = %err,
            "failed to load questions"
        );
    })?;

    let questions = entities
        .into_iter()
        .filter_map(|entity| match Question::try_from(entity) {
            Ok(question) => Some(question),
            Err(reason) => {
                warn!(contest_id = %blueprint.contest_id, %reason, "skipping unusable question");
                None
            }
        })
        .collect::<Vec<_>>();
    let mut questions = drop_duplicate_questions(&blueprint.contest_id, questions);

    if !explicit {
        questions.truncate(blueprint.question_count);
    }
    if questions.is_empty() {
        return Err(ServiceError::InvalidInput(format!(
            "no playable questions for contest `{}`",
            blueprint.contest_id
        )));
    }

    let config = state.config();
    let settings = RoomSettings {
        scoring: config.scoring,
        intermission: config.rooms.intermission,
        contest_duration: blueprint
            .duration_minutes
            .map(|minutes| Duration::from_secs(u64::from(minutes) * 60)),
    };
    let info = RoomInfo {
        contest_id: blueprint.contest_id,
        name: blueprint.name,
        difficulty: blueprint.difficulty,
        host_user_id: blueprint.host_user_id,
    };

    info!(
        contest_id = %info.contest_id,
        host = %info.host_user_id,
        questions = questions.len(),
        "opening contest room"
    );

    let room = Room::new(info, questions, settings, Instant::now());
    state.metrics().room_created();
    Ok(spawn_room(room, state.room_deps()))
}

/// Find the room a socket wants to join, creating it lazily for hosts when enabled.
pub async fn resolve_room_for_join(
    state: &SharedState,
    contest_id: &str,
    token: &VerifiedToken,
) -> Result<RoomHandle, ServiceError> {
    if let Some(handle) = state.registry().get(contest_id) {
        return Ok(handle);
    }

    let rooms = &state.config().rooms;
    if !rooms.lazy_creation || !token.role.can_create_rooms() {
        return Err(ServiceError::NotFound(format!("contest `{contest_id}` not found")));
    }

    let blueprint = RoomBlueprint {
        contest_id: contest_id.to_string(),
        name: contest_id.to_string(),
        difficulty: "medium".into(),
        question_count: rooms.default_question_count as usize,
        duration_minutes: rooms.default_duration_minutes,
        selected_question_ids: Vec::new(),
        host_user_id: token.user_id.clone(),
    };

    let (handle, created) = state
        .registry()
        .get_or_create(contest_id, || open_room(state, blueprint))
        .await?;
    if created {
        info!(contest_id = %contest_id, user_id = %token.user_id, "room created lazily on join");
    }
    Ok(handle)
}

/// Current standings, read through the room's command queue.
pub async fn standings(state: &SharedState, contest_id: &str) -> Result<StandingsResponse, ServiceError> {
    let handle = state
        .registry()
        .get(contest_id)
        .ok_or_else(|| ServiceError::NotFound(format!("contest `{contest_id}` not found")))?;
    Ok(handle.standings().await?)
}

/// Remove a room from the registry and stop its actor.
pub async fn evict_room(state: &SharedState, contest_id: &str, reason: &str) -> bool {
    let Some(handle) = state.registry().evict(contest_id) else {
        return false;
    };
    info!(contest_id = %contest_id, %reason, "evicting room");
    handle.shutdown().await;
    state.metrics().room_evicted();
    true
}

/// Keep the first occurrence of every question id. Answers are tracked per id,
/// so a repeated question could never be answered a second time.
fn drop_duplicate_questions(contest_id: &str, questions: Vec<Question>) -> Vec<Question> {
    let mut seen = HashSet::new();
    questions
        .into_iter()
        .filter(|question| {
            let fresh = seen.insert(question.id.clone());
            if !fresh {
                warn!(contest_id = %contest_id, question_id = %question.id, "dropping duplicate question");
            }
            fresh
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn question(id: &str) -> Question {
        Question {
            id: id.into(),
            text: format!("prompt {id}"),
            options: vec!["a".into(), "b".into()],
            correct_answer: "a".into(),
            points: 10,
            time_allocation_seconds: 30,
        }
    }

    #[test]
    fn duplicate_question_ids_keep_first_occurrence() {
        let kept = drop_duplicate_questions(
            "c1",
            vec![question("q1"), question("q2"), question("q1"), question("q3")],
        );
        let ids: Vec<&str> = kept.iter().map(|question| question.id.as_str()).collect();
        assert_eq!(ids, ["q1", "q2", "q3"]);
    }
}
