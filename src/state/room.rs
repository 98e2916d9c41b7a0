//! Contest room state machine.
//!
//! A [`Room`] owns the roster, the question cursor, per-question deadlines and
//! the score ledger of one contest. It performs no I/O: every operation takes
//! the current [`Instant`] and returns the [`Delivery`] list the caller must
//! fan out. The room actor is the only owner, which serialises every command.

use std::{collections::HashSet, sync::Arc, time::Duration, time::SystemTime};

use indexmap::IndexMap;
use thiserror::Error;
use tokio::time::Instant;

use crate::{
    dto::{
        contest::{StandingEntry, StandingsResponse},
        ws::{
            AnswerResultPayload, ContestStartedPayload, ErrorPayload, FinalStanding,
            GameOverPayload, NewQuestionPayload, PlayerJoinedPayload, PlayerLeftPayload,
            PlayerListPayload, PlayerSummary, QuestionTimeoutPayload, ScoreUpdatePayload,
            ServerMessage,
        },
    },
    services::scoring::{self, ScoringRules},
    state::{
        contest::{ConnectionId, Participant, Question, Submission},
        state_machine::{ContestEvent, ContestStateMachine, ContestStatus, InvalidTransition},
    },
};

const STARTED_MESSAGE: &str = "Contest started! Get ready for the first question.";
const FINISHED_MESSAGE: &str = "Contest finished!";

/// Static description of the contest behind a room.
#[derive(Debug, Clone)]
pub struct RoomInfo {
    /// Externally assigned contest identifier.
    pub contest_id: String,
    /// Display name.
    pub name: String,
    /// Difficulty label the questions were picked with.
    pub difficulty: String,
    /// Creator; the only user allowed to start the contest.
    pub host_user_id: String,
}

/// Per-room tunables.
#[derive(Debug, Clone, Copy)]
pub struct RoomSettings {
    /// Speed-weighted scoring parameters.
    pub scoring: ScoringRules,
    /// Pause between a question timeout and the next question.
    pub intermission: Duration,
    /// Overall time budget measured from the start, if any.
    pub contest_duration: Option<Duration>,
}

impl Default for RoomSettings {
    fn default() -> Self {
        Self {
            scoring: ScoringRules::default(),
            intermission: Duration::ZERO,
            contest_duration: None,
        }
    }
}

/// Outbound event produced by a room transition.
#[derive(Debug, Clone)]
pub enum Delivery {
    /// Send to every attached socket.
    Broadcast(ServerMessage),
    /// Send to one socket only.
    Unicast(ConnectionId, ServerMessage),
}

/// Answer received from a socket, stamped on arrival.
#[derive(Debug, Clone)]
pub struct AnswerSubmission {
    /// Submitting user.
    pub user_id: String,
    /// Socket that sent the frame.
    pub connection: ConnectionId,
    /// Question the client answered.
    pub question_id: String,
    /// Selected option text.
    pub answer: String,
    /// Monotonic receipt time used for deadline and timing checks.
    pub received_at: Instant,
    /// Wall-clock receipt time kept for the persisted record.
    pub submitted_at: SystemTime,
}

/// Reasons a command is rejected. Rejections never change room state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    /// START_GAME from someone other than the host.
    #[error("only the contest host can start the contest")]
    NotHost,
    /// START_GAME on a room nobody joined.
    #[error("cannot start a contest without participants")]
    NoParticipants,
    /// Command not valid for the current status.
    #[error(transparent)]
    InvalidTransition(#[from] InvalidTransition),
    /// Submission while the contest is not running.
    #[error("contest is {}", .0.as_str())]
    NotInProgress(ContestStatus),
    /// Submission from a user that never joined.
    #[error("user `{0}` is not part of this contest")]
    UnknownParticipant(String),
    /// Submission between questions.
    #[error("no question is currently open")]
    NoLiveQuestion,
    /// Submission for a question other than the live one.
    #[error("question `{0}` is not the current question")]
    StaleQuestion(String),
    /// Submission received after the deadline.
    #[error("answer received after the deadline")]
    LateSubmission,
    /// Second submission for the same question.
    #[error("an answer was already recorded for this question")]
    AlreadyAnswered,
    /// Answer that matches none of the options.
    #[error("answer is not one of the question options")]
    UnknownOption,
}

impl CommandError {
    /// Stable machine-readable code sent to clients.
    pub fn code(&self) -> &'static str {
        match self {
            CommandError::NotHost => "NOT_HOST",
            CommandError::NoParticipants => "NO_PARTICIPANTS",
            CommandError::InvalidTransition(_) => "INVALID_STATE",
            CommandError::NotInProgress(_) => "NOT_IN_PROGRESS",
            CommandError::UnknownParticipant(_) => "UNKNOWN_PARTICIPANT",
            CommandError::NoLiveQuestion => "NO_LIVE_QUESTION",
            CommandError::StaleQuestion(_) => "STALE_QUESTION",
            CommandError::LateSubmission => "LATE_SUBMISSION",
            CommandError::AlreadyAnswered => "ALREADY_ANSWERED",
            CommandError::UnknownOption => "UNKNOWN_OPTION",
        }
    }
}

/// Where the room is within the question loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum QuestionPhase {
    /// Before the first question or after the last one.
    Idle,
    /// A question accepts answers until `deadline`.
    Live { started_at: Instant, deadline: Instant },
    /// Correct answer revealed; next question at `next_at`.
    Intermission { next_at: Instant },
}

/// Read-only lifecycle snapshot published for the reaper and health checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoomLifecycle {
    /// Current status.
    pub status: ContestStatus,
    /// Participants ever joined.
    pub participants: usize,
    /// Participants with at least one socket.
    pub connected: usize,
    /// Time of the last command or transition.
    pub last_activity: Instant,
    /// Time the room finished, if it did.
    pub finished_at: Option<Instant>,
}

/// Everything the persistence gateway needs once the contest is over.
#[derive(Debug, Clone)]
pub struct ContestOutcome {
    /// Contest identifier.
    pub contest_id: String,
    /// Questions in play order.
    pub questions: Arc<[Question]>,
    /// Ranked final scoreboard.
    pub standings: Vec<FinalStanding>,
    /// Every accepted submission in acceptance order.
    pub submissions: Vec<Submission>,
}

/// Per-contest state machine.
#[derive(Debug)]
pub struct Room {
    info: RoomInfo,
    questions: Arc<[Question]>,
    settings: RoomSettings,
    machine: ContestStateMachine,
    current_index: Option<usize>,
    phase: QuestionPhase,
    participants: IndexMap<String, Participant>,
    answers_this_question: HashSet<String>,
    submissions: Vec<Submission>,
    contest_ends_at: Option<Instant>,
    finished_at: Option<Instant>,
    last_activity: Instant,
}

impl Room {
    /// Build a waiting room over an immutable question set.
    pub fn new(info: RoomInfo, questions: Vec<Question>, settings: RoomSettings, now: Instant) -> Self {
        Self {
            info,
            questions: Arc::from(questions),
            settings,
            machine: ContestStateMachine::new(),
            current_index: None,
            phase: QuestionPhase::Idle,
            participants: IndexMap::new(),
            answers_this_question: HashSet::new(),
            submissions: Vec::new(),
            contest_ends_at: None,
            finished_at: None,
            last_activity: now,
        }
    }

    /// Contest metadata.
    pub fn info(&self) -> &RoomInfo {
        &self.info
    }

    /// Current status.
    pub fn status(&self) -> ContestStatus {
        self.machine.status()
    }

    /// Index of the current (or last played) question; `None` before the first.
    pub fn current_question_index(&self) -> Option<usize> {
        self.current_index
    }

    /// Number of questions in the contest.
    pub fn total_questions(&self) -> usize {
        self.questions.len()
    }

    /// Participant lookup.
    pub fn participant(&self, user_id: &str) -> Option<&Participant> {
        self.participants.get(user_id)
    }

    /// Next instant at which [`Room::on_timer`] has work to do.
    pub fn next_wakeup(&self) -> Option<Instant> {
        match self.phase {
            QuestionPhase::Idle => None,
            QuestionPhase::Live { deadline, .. } => Some(deadline),
            QuestionPhase::Intermission { next_at } => Some(next_at),
        }
    }

    /// Snapshot for the reaper.
    pub fn lifecycle(&self) -> RoomLifecycle {
        RoomLifecycle {
            status: self.status(),
            participants: self.participants.len(),
            connected: self.participants.values().filter(|p| p.connected()).count(),
            last_activity: self.last_activity,
            finished_at: self.finished_at,
        }
    }

    /// Attach a socket for `user_id`, creating the participant on first join.
    pub fn join(
        &mut self,
        user_id: &str,
        username: &str,
        connection: ConnectionId,
        now: Instant,
    ) -> Vec<Delivery> {
        if self.status() == ContestStatus::Finished && !self.participants.contains_key(user_id) {
            return vec![Delivery::Unicast(
                connection,
                ServerMessage::GameOver(self.game_over_payload()),
            )];
        }

        self.last_activity = now;

        let is_new = match self.participants.get_mut(user_id) {
            Some(existing) => {
                existing.attach(connection);
                false
            }
            None => {
                let mut participant = Participant::new(user_id.to_string(), username.to_string());
                participant.attach(connection);
                self.participants.insert(user_id.to_string(), participant);
                true
            }
        };

        let players = self.players();
        let mut deliveries = Vec::new();
        if is_new {
            deliveries.push(Delivery::Broadcast(ServerMessage::PlayerJoined(
                PlayerJoinedPayload {
                    user_id: user_id.to_string(),
                    username: username.to_string(),
                    players,
                },
            )));
        } else {
            deliveries.push(Delivery::Broadcast(ServerMessage::PlayerList(
                PlayerListPayload { players },
            )));
        }

        match self.status() {
            ContestStatus::Waiting => {}
            ContestStatus::InProgress => {
                deliveries.push(Delivery::Unicast(connection, self.started_message()));
                if let Some(question) = self.live_question_message(now) {
                    deliveries.push(Delivery::Unicast(connection, question));
                }
            }
            ContestStatus::Finished => {
                deliveries.push(Delivery::Unicast(
                    connection,
                    ServerMessage::GameOver(self.game_over_payload()),
                ));
            }
        }

        deliveries
    }

    /// Detach a socket. The participant stays in the roster.
    pub fn leave(&mut self, user_id: &str, connection: ConnectionId, now: Instant) -> Vec<Delivery> {
        let Some(participant) = self.participants.get_mut(user_id) else {
            return Vec::new();
        };

        if !participant.detach(connection) || participant.connected() {
            return Vec::new();
        }

        self.last_activity = now;
        let username = participant.username.clone();
        vec![Delivery::Broadcast(ServerMessage::PlayerLeft(
            PlayerLeftPayload {
                user_id: user_id.to_string(),
                username,
                players: self.players(),
            },
        ))]
    }

    /// Host-only `waiting → in_progress` transition; opens question 0.
    pub fn start(&mut self, user_id: &str, now: Instant) -> Result<Vec<Delivery>, CommandError> {
        if !self.machine.can_apply(ContestEvent::Start) {
            return Err(CommandError::InvalidTransition(InvalidTransition {
                from: self.status(),
                event: ContestEvent::Start,
            }));
        }
        if user_id != self.info.host_user_id {
            return Err(CommandError::NotHost);
        }
        if self.participants.is_empty() {
            return Err(CommandError::NoParticipants);
        }

        self.machine.apply(ContestEvent::Start)?;
        self.last_activity = now;
        self.contest_ends_at = self.settings.contest_duration.map(|budget| now + budget);

        let mut deliveries = vec![Delivery::Broadcast(self.started_message())];
        deliveries.extend(self.advance(now));
        Ok(deliveries)
    }

    /// Validate, score and record an answer for the live question.
    pub fn submit(&mut self, submission: &AnswerSubmission) -> Result<Vec<Delivery>, CommandError> {
        let status = self.status();
        if status != ContestStatus::InProgress {
            return Err(CommandError::NotInProgress(status));
        }

        let QuestionPhase::Live {
            started_at,
            deadline,
        } = self.phase
        else {
            return Err(CommandError::NoLiveQuestion);
        };
        let index = self.current_index.ok_or(CommandError::NoLiveQuestion)?;
        let questions = Arc::clone(&self.questions);
        let question = &questions[index];

        if question.id != submission.question_id {
            return Err(CommandError::StaleQuestion(submission.question_id.clone()));
        }
        if submission.received_at > deadline {
            return Err(CommandError::LateSubmission);
        }

        let participant = self
            .participants
            .get_mut(&submission.user_id)
            .ok_or_else(|| CommandError::UnknownParticipant(submission.user_id.clone()))?;

        if self.answers_this_question.contains(&submission.user_id)
            || participant.has_answered(&question.id)
        {
            return Err(CommandError::AlreadyAnswered);
        }
        if !question
            .options
            .iter()
            .any(|option| option.trim() == submission.answer.trim())
        {
            return Err(CommandError::UnknownOption);
        }

        let time_taken_ms = submission
            .received_at
            .saturating_duration_since(started_at)
            .as_millis() as u64;
        let outcome = scoring::score_answer(
            question,
            &submission.answer,
            time_taken_ms,
            &self.settings.scoring,
        );

        participant.record(&question.id, &outcome);
        let new_score = participant.score();
        let username = participant.username.clone();

        self.answers_this_question.insert(submission.user_id.clone());
        self.submissions.push(Submission {
            user_id: submission.user_id.clone(),
            question_id: question.id.clone(),
            selected_answer: submission.answer.clone(),
            is_correct: outcome.is_correct,
            time_taken_ms,
            points_awarded: outcome.points_awarded,
            submitted_at: submission.submitted_at,
        });
        self.last_activity = submission.received_at;

        Ok(vec![
            Delivery::Unicast(
                submission.connection,
                ServerMessage::AnswerResult(AnswerResultPayload {
                    accepted: true,
                    question_id: question.id.clone(),
                    is_correct: outcome.is_correct,
                    new_score,
                    points_awarded: outcome.points_awarded,
                    time_taken: time_taken_ms as f64 / 1_000.0,
                    reason: None,
                }),
            ),
            Delivery::Broadcast(ServerMessage::ScoreUpdate(ScoreUpdatePayload {
                user_id: submission.user_id.clone(),
                username,
                score: new_score,
                points_earned: outcome.points_awarded,
            })),
        ])
    }

    /// Negative `ANSWER_RESULT` for a rejected submission.
    pub fn answer_rejected(&self, submission: &AnswerSubmission, error: &CommandError) -> Delivery {
        let new_score = self
            .participants
            .get(&submission.user_id)
            .map(Participant::score)
            .unwrap_or_default();

        Delivery::Unicast(
            submission.connection,
            ServerMessage::AnswerResult(AnswerResultPayload {
                accepted: false,
                question_id: submission.question_id.clone(),
                is_correct: false,
                new_score,
                points_awarded: 0,
                time_taken: 0.0,
                reason: Some(error.code().to_string()),
            }),
        )
    }

    /// `ERROR` event for a rejected non-answer command.
    pub fn command_rejected(connection: ConnectionId, error: &CommandError) -> Delivery {
        Delivery::Unicast(
            connection,
            ServerMessage::Error(ErrorPayload {
                code: error.code().to_string(),
                message: error.to_string(),
            }),
        )
    }

    /// Handle a due deadline or intermission. Calling early is a no-op.
    pub fn on_timer(&mut self, now: Instant) -> Vec<Delivery> {
        match self.phase {
            QuestionPhase::Live { deadline, .. } if now >= deadline => self.close_question(now),
            QuestionPhase::Intermission { next_at } if now >= next_at => self.advance(now),
            _ => Vec::new(),
        }
    }

    /// Ranked standings for read-only queries.
    pub fn standings(&self) -> StandingsResponse {
        let standings = scoring::rank(self.participants.values())
            .into_iter()
            .map(|(rank, participant)| StandingEntry {
                rank,
                user_id: participant.user_id.clone(),
                username: participant.username.clone(),
                score: participant.score(),
                time_spent_ms: participant.time_spent_ms(),
                connected: participant.connected(),
            })
            .collect();

        StandingsResponse {
            contest_id: self.info.contest_id.clone(),
            name: self.info.name.clone(),
            status: self.status(),
            current_question_index: self.current_index,
            total_questions: self.total_questions(),
            standings,
        }
    }

    /// Final record handed to persistence.
    pub fn outcome(&self) -> ContestOutcome {
        ContestOutcome {
            contest_id: self.info.contest_id.clone(),
            questions: Arc::clone(&self.questions),
            standings: self.final_scoreboard(),
            submissions: self.submissions.clone(),
        }
    }

    fn close_question(&mut self, now: Instant) -> Vec<Delivery> {
        let Some(index) = self.current_index else {
            self.phase = QuestionPhase::Idle;
            return Vec::new();
        };
        let question = &self.questions[index];
        let mut deliveries = vec![Delivery::Broadcast(ServerMessage::QuestionTimeout(
            QuestionTimeoutPayload {
                question_id: question.id.clone(),
                correct_answer: question.correct_answer.clone(),
            },
        ))];

        let is_last = index + 1 >= self.questions.len();
        if is_last || self.out_of_time(now) {
            deliveries.extend(self.finish(now));
        } else if self.settings.intermission.is_zero() {
            deliveries.extend(self.advance(now));
        } else {
            self.phase = QuestionPhase::Intermission {
                next_at: now + self.settings.intermission,
            };
        }
        self.last_activity = now;
        deliveries
    }

    fn advance(&mut self, now: Instant) -> Vec<Delivery> {
        let next = self.current_index.map_or(0, |index| index + 1);
        if next >= self.questions.len() || self.out_of_time(now) {
            return self.finish(now);
        }

        self.current_index = Some(next);
        self.answers_this_question.clear();

        let question = &self.questions[next];
        let mut deadline = now + Duration::from_secs(u64::from(question.time_allocation_seconds));
        if let Some(end) = self.contest_ends_at {
            deadline = deadline.min(end);
        }
        self.phase = QuestionPhase::Live {
            started_at: now,
            deadline,
        };
        self.last_activity = now;

        vec![Delivery::Broadcast(self.question_message(next, deadline, now))]
    }

    fn finish(&mut self, now: Instant) -> Vec<Delivery> {
        if self.machine.apply(ContestEvent::Finish).is_err() {
            return Vec::new();
        }
        self.phase = QuestionPhase::Idle;
        self.finished_at = Some(now);
        self.last_activity = now;

        vec![Delivery::Broadcast(ServerMessage::GameOver(
            self.game_over_payload(),
        ))]
    }

    fn out_of_time(&self, now: Instant) -> bool {
        self.contest_ends_at.is_some_and(|end| now >= end)
    }

    fn players(&self) -> Vec<PlayerSummary> {
        self.participants
            .values()
            .map(|participant| PlayerSummary {
                user_id: participant.user_id.clone(),
                username: participant.username.clone(),
                score: participant.score(),
                connected: participant.connected(),
            })
            .collect()
    }

    fn started_message(&self) -> ServerMessage {
        ServerMessage::ContestStarted(ContestStartedPayload {
            message: STARTED_MESSAGE.to_string(),
            total_questions: self.total_questions(),
            players: self.players(),
        })
    }

    fn live_question_message(&self, now: Instant) -> Option<ServerMessage> {
        match (self.phase, self.current_index) {
            (QuestionPhase::Live { deadline, .. }, Some(index)) => {
                Some(self.question_message(index, deadline, now))
            }
            _ => None,
        }
    }

    fn question_message(&self, index: usize, deadline: Instant, now: Instant) -> ServerMessage {
        let question = &self.questions[index];
        let remaining_ms = deadline.saturating_duration_since(now).as_millis() as u64;

        ServerMessage::NewQuestion(NewQuestionPayload {
            question_id: question.id.clone(),
            question_text: question.text.clone(),
            options: question.options.clone(),
            question_number: index + 1,
            total_questions: self.total_questions(),
            timer: remaining_ms.div_ceil(1_000),
            points: question.points,
        })
    }

    fn final_scoreboard(&self) -> Vec<FinalStanding> {
        scoring::rank(self.participants.values())
            .into_iter()
            .map(|(rank, participant)| FinalStanding {
                user_id: participant.user_id.clone(),
                username: participant.username.clone(),
                score: participant.score(),
                rank,
                time_spent_ms: participant.time_spent_ms(),
            })
            .collect()
    }

    fn game_over_payload(&self) -> GameOverPayload {
        GameOverPayload {
            message: FINISHED_MESSAGE.to_string(),
            final_scoreboard: self.final_scoreboard(),
        }
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;

    const HOST: &str = "host";

    fn question(id: &str, points: u32, seconds: u32) -> Question {
        Question {
            id: id.into(),
            text: format!("prompt {id}"),
            options: vec!["right".into(), "wrong".into()],
            correct_answer: "right".into(),
            points,
            time_allocation_seconds: seconds,
        }
    }

    fn room_with(settings: RoomSettings, now: Instant) -> Room {
        Room::new(
            RoomInfo {
                contest_id: "c1".into(),
                name: "Quick fire".into(),
                difficulty: "easy".into(),
                host_user_id: HOST.into(),
            },
            vec![question("q1", 10, 30), question("q2", 10, 30)],
            settings,
            now,
        )
    }

    fn room(now: Instant) -> Room {
        room_with(RoomSettings::default(), now)
    }

    fn submission(user: &str, conn: ConnectionId, question: &str, answer: &str, at: Instant) -> AnswerSubmission {
        AnswerSubmission {
            user_id: user.into(),
            connection: conn,
            question_id: question.into(),
            answer: answer.into(),
            received_at: at,
            submitted_at: SystemTime::now(),
        }
    }

    fn messages(deliveries: &[Delivery]) -> Vec<&ServerMessage> {
        deliveries
            .iter()
            .map(|delivery| match delivery {
                Delivery::Broadcast(message) | Delivery::Unicast(_, message) => message,
            })
            .collect()
    }

    #[test]
    fn join_adds_participant_once_and_keeps_score_on_reattach() {
        let t0 = Instant::now();
        let mut room = room(t0);
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();

        let out = room.join(HOST, "Host", first, t0);
        assert!(matches!(messages(&out)[0], ServerMessage::PlayerJoined(_)));

        room.start(HOST, t0).unwrap();
        room.submit(&submission(HOST, first, "q1", "right", t0 + Duration::from_secs(3)))
            .unwrap();
        let score = room.participant(HOST).unwrap().score();

        let out = room.join(HOST, "Host", second, t0 + Duration::from_secs(4));
        assert!(matches!(messages(&out)[0], ServerMessage::PlayerList(_)));
        assert_eq!(room.lifecycle().participants, 1);
        assert_eq!(room.participant(HOST).unwrap().score(), score);
    }

    #[test]
    fn leave_keeps_roster_and_reports_only_last_socket() {
        let t0 = Instant::now();
        let mut room = room(t0);
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        room.join("u1", "Ada", a, t0);
        room.join("u1", "Ada", b, t0);

        assert!(room.leave("u1", a, t0).is_empty());
        assert!(room.participant("u1").unwrap().connected());

        let out = room.leave("u1", b, t0);
        assert!(matches!(messages(&out)[0], ServerMessage::PlayerLeft(_)));
        assert!(!room.participant("u1").unwrap().connected());
        assert_eq!(room.lifecycle().participants, 1);
    }

    #[test]
    fn only_host_can_start() {
        let t0 = Instant::now();
        let mut room = room(t0);
        room.join("u1", "Ada", Uuid::new_v4(), t0);

        assert_eq!(room.start("u1", t0).unwrap_err(), CommandError::NotHost);
        assert_eq!(room.status(), ContestStatus::Waiting);
        assert_eq!(room.current_question_index(), None);
    }

    #[test]
    fn start_without_participants_is_rejected() {
        let t0 = Instant::now();
        let mut room = room(t0);
        assert_eq!(room.start(HOST, t0).unwrap_err(), CommandError::NoParticipants);
    }

    #[test]
    fn start_broadcasts_contest_started_then_first_question() {
        let t0 = Instant::now();
        let mut room = room(t0);
        room.join(HOST, "Host", Uuid::new_v4(), t0);

        let out = room.start(HOST, t0).unwrap();
        let msgs = messages(&out);
        assert!(matches!(msgs[0], ServerMessage::ContestStarted(_)));
        match msgs[1] {
            ServerMessage::NewQuestion(payload) => {
                assert_eq!(payload.question_id, "q1");
                assert_eq!(payload.question_number, 1);
                assert_eq!(payload.timer, 30);
            }
            other => panic!("expected NEW_QUESTION, got {other:?}"),
        }
        assert_eq!(room.current_question_index(), Some(0));
        assert_eq!(room.next_wakeup(), Some(t0 + Duration::from_secs(30)));

        let err = room.start(HOST, t0).unwrap_err();
        assert!(matches!(err, CommandError::InvalidTransition(_)));
    }

    #[test]
    fn second_answer_for_same_question_never_double_counts() {
        let t0 = Instant::now();
        let mut room = room(t0);
        let conn = Uuid::new_v4();
        room.join(HOST, "Host", conn, t0);
        room.start(HOST, t0).unwrap();

        room.submit(&submission(HOST, conn, "q1", "right", t0 + Duration::from_secs(5)))
            .unwrap();
        let err = room
            .submit(&submission(HOST, conn, "q1", "right", t0 + Duration::from_secs(6)))
            .unwrap_err();

        assert_eq!(err, CommandError::AlreadyAnswered);
        assert_eq!(room.participant(HOST).unwrap().score(), 8);
    }

    #[test]
    fn late_submission_is_rejected_even_before_timer_fires() {
        let t0 = Instant::now();
        let mut room = room(t0);
        let conn = Uuid::new_v4();
        room.join(HOST, "Host", conn, t0);
        room.start(HOST, t0).unwrap();

        let err = room
            .submit(&submission(HOST, conn, "q1", "right", t0 + Duration::from_millis(30_001)))
            .unwrap_err();
        assert_eq!(err, CommandError::LateSubmission);
        assert_eq!(room.participant(HOST).unwrap().score(), 0);
        assert_eq!(room.current_question_index(), Some(0));
    }

    #[test]
    fn stale_and_unknown_submissions_are_rejected() {
        let t0 = Instant::now();
        let mut room = room(t0);
        let conn = Uuid::new_v4();
        room.join(HOST, "Host", conn, t0);

        let err = room
            .submit(&submission(HOST, conn, "q1", "right", t0))
            .unwrap_err();
        assert_eq!(err, CommandError::NotInProgress(ContestStatus::Waiting));

        room.start(HOST, t0).unwrap();
        assert_eq!(
            room.submit(&submission(HOST, conn, "q2", "right", t0)).unwrap_err(),
            CommandError::StaleQuestion("q2".into())
        );
        assert_eq!(
            room.submit(&submission("ghost", conn, "q1", "right", t0)).unwrap_err(),
            CommandError::UnknownParticipant("ghost".into())
        );
        assert_eq!(
            room.submit(&submission(HOST, conn, "q1", "maybe", t0)).unwrap_err(),
            CommandError::UnknownOption
        );
    }

    #[test]
    fn rejected_answer_result_reports_reason() {
        let t0 = Instant::now();
        let room = room(t0);
        let conn = Uuid::new_v4();
        let sub = submission(HOST, conn, "q1", "right", t0);
        match room.answer_rejected(&sub, &CommandError::LateSubmission) {
            Delivery::Unicast(target, ServerMessage::AnswerResult(payload)) => {
                assert_eq!(target, conn);
                assert!(!payload.accepted);
                assert_eq!(payload.reason.as_deref(), Some("LATE_SUBMISSION"));
            }
            other => panic!("unexpected delivery {other:?}"),
        }
    }

    #[test]
    fn deadline_advances_exactly_one_question_then_finishes() {
        let t0 = Instant::now();
        let mut room = room(t0);
        let conn = Uuid::new_v4();
        room.join(HOST, "Host", conn, t0);
        room.start(HOST, t0).unwrap();

        assert!(room.on_timer(t0 + Duration::from_secs(29)).is_empty());

        let t1 = t0 + Duration::from_secs(30);
        let out = room.on_timer(t1);
        let msgs = messages(&out);
        assert!(matches!(msgs[0], ServerMessage::QuestionTimeout(_)));
        assert!(matches!(msgs[1], ServerMessage::NewQuestion(_)));
        assert_eq!(room.current_question_index(), Some(1));

        let t2 = t1 + Duration::from_secs(30);
        let out = room.on_timer(t2);
        let msgs = messages(&out);
        assert!(matches!(msgs[0], ServerMessage::QuestionTimeout(_)));
        assert!(matches!(msgs[1], ServerMessage::GameOver(_)));
        assert_eq!(room.status(), ContestStatus::Finished);
        assert_eq!(room.current_question_index(), Some(1));
        assert_eq!(room.next_wakeup(), None);
        assert_eq!(room.lifecycle().finished_at, Some(t2));

        let err = room.start(HOST, t2).unwrap_err();
        assert!(matches!(err, CommandError::InvalidTransition(_)));
        assert_eq!(
            room.submit(&submission(HOST, conn, "q2", "right", t2)).unwrap_err(),
            CommandError::NotInProgress(ContestStatus::Finished)
        );
    }

    #[test]
    fn intermission_closes_question_before_next_one() {
        let t0 = Instant::now();
        let settings = RoomSettings {
            intermission: Duration::from_secs(3),
            ..RoomSettings::default()
        };
        let mut room = room_with(settings, t0);
        let conn = Uuid::new_v4();
        room.join(HOST, "Host", conn, t0);
        room.start(HOST, t0).unwrap();

        let t1 = t0 + Duration::from_secs(30);
        let out = room.on_timer(t1);
        assert_eq!(out.len(), 1);
        assert_eq!(
            room.submit(&submission(HOST, conn, "q1", "right", t1)).unwrap_err(),
            CommandError::NoLiveQuestion
        );

        let out = room.on_timer(t1 + Duration::from_secs(3));
        assert!(matches!(messages(&out)[0], ServerMessage::NewQuestion(_)));
        assert_eq!(room.current_question_index(), Some(1));
    }

    #[test]
    fn contest_duration_clamps_deadline_and_ends_contest() {
        let t0 = Instant::now();
        let settings = RoomSettings {
            contest_duration: Some(Duration::from_secs(40)),
            ..RoomSettings::default()
        };
        let mut room = room_with(settings, t0);
        room.join(HOST, "Host", Uuid::new_v4(), t0);
        room.start(HOST, t0).unwrap();

        let out = room.on_timer(t0 + Duration::from_secs(30));
        match messages(&out)[1] {
            ServerMessage::NewQuestion(payload) => assert_eq!(payload.timer, 10),
            other => panic!("expected NEW_QUESTION, got {other:?}"),
        }
        assert_eq!(room.next_wakeup(), Some(t0 + Duration::from_secs(40)));

        let out = room.on_timer(t0 + Duration::from_secs(40));
        assert!(matches!(messages(&out)[1], ServerMessage::GameOver(_)));
    }

    #[test]
    fn late_joiner_gets_remaining_time_not_full_duration() {
        let t0 = Instant::now();
        let mut room = room(t0);
        room.join(HOST, "Host", Uuid::new_v4(), t0);
        room.start(HOST, t0).unwrap();

        let late = Uuid::new_v4();
        let out = room.join("b", "Bea", late, t0 + Duration::from_secs(12));
        let question = out
            .iter()
            .find_map(|delivery| match delivery {
                Delivery::Unicast(target, ServerMessage::NewQuestion(payload)) if *target == late => {
                    Some(payload.clone())
                }
                _ => None,
            })
            .expect("late joiner receives the live question");
        assert_eq!(question.question_id, "q1");
        assert_eq!(question.timer, 18);
    }

    #[test]
    fn joining_finished_room_returns_final_scoreboard() {
        let t0 = Instant::now();
        let mut room = room(t0);
        room.join(HOST, "Host", Uuid::new_v4(), t0);
        room.start(HOST, t0).unwrap();
        room.on_timer(t0 + Duration::from_secs(30));
        room.on_timer(t0 + Duration::from_secs(60));

        let conn = Uuid::new_v4();
        let out = room.join(HOST, "Host", conn, t0 + Duration::from_secs(90));
        assert!(out.iter().any(|delivery| matches!(
            delivery,
            Delivery::Unicast(target, ServerMessage::GameOver(_)) if *target == conn
        )));
    }

    #[test]
    fn newcomer_to_finished_room_is_not_added_to_results() {
        let t0 = Instant::now();
        let mut room = room(t0);
        room.join(HOST, "Host", Uuid::new_v4(), t0);
        room.start(HOST, t0).unwrap();
        room.on_timer(t0 + Duration::from_secs(30));
        room.on_timer(t0 + Duration::from_secs(60));
        assert_eq!(room.status(), ContestStatus::Finished);

        let conn = Uuid::new_v4();
        let out = room.join("visitor", "Visitor", conn, t0 + Duration::from_secs(90));
        assert_eq!(out.len(), 1);
        let Delivery::Unicast(target, ServerMessage::GameOver(payload)) = &out[0] else {
            panic!("expected a unicast GAME_OVER, got {out:?}");
        };
        assert_eq!(*target, conn);
        assert_eq!(payload.final_scoreboard.len(), 1);

        assert!(room.participant("visitor").is_none());
        assert_eq!(room.standings().standings.len(), 1);
        assert_eq!(room.outcome().standings.len(), 1);
    }

    #[test]
    fn scoreboard_ties_fall_back_to_join_order() {
        let t0 = Instant::now();
        let mut room = room(t0);
        room.join(HOST, "Host", Uuid::new_v4(), t0);
        room.join("b", "Bea", Uuid::new_v4(), t0);
        room.start(HOST, t0).unwrap();
        room.on_timer(t0 + Duration::from_secs(30));
        room.on_timer(t0 + Duration::from_secs(60));

        let outcome = room.outcome();
        let order = outcome
            .standings
            .iter()
            .map(|row| (row.rank, row.user_id.as_str()))
            .collect::<Vec<_>>();
        assert_eq!(order, vec![(1, HOST), (2, "b")]);
    }
}
