use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use deadline_bot::bot::{BotContext, Dispatcher, handle_update};
use deadline_bot::config::BotConfig;
use deadline_bot::db::{self, CredentialStore};
use deadline_bot::lms::{Assignment, Course, LmsApi, LmsError, SiteInfo};
use deadline_bot::telegram::models::{CallbackQuery, Chat, ChatKind, Message, User};
use deadline_bot::telegram::{OutgoingMessage, TelegramApi, TelegramError, Update};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

const ADMIN_ID: i64 = 1000;
const STUDENT_ID: i64 = 7;
const GROUP_ID: i64 = -500;

#[derive(Debug, Clone)]
enum Sent {
    Message(OutgoingMessage),
    Edit { chat_id: i64, text: String },
    Delete { chat_id: i64 },
    Document { chat_id: i64, file_name: String, size: usize },
}

#[derive(Default)]
struct FakeTelegram {
    sent: Mutex<Vec<Sent>>,
    updates: Mutex<VecDeque<Vec<Update>>>,
    offsets: Mutex<Vec<Option<i64>>>,
    /// Chats whose deliveries fail, for broadcast accounting.
    blocked: Vec<i64>,
}

impl FakeTelegram {
    fn texts_to(&self, chat_id: i64) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter_map(|sent| match sent {
                Sent::Message(m) if m.chat_id == chat_id => Some(m.text.clone()),
                Sent::Edit { chat_id: c, text } if *c == chat_id => Some(text.clone()),
                _ => None,
            })
            .collect()
    }

    fn last_text_to(&self, chat_id: i64) -> String {
        self.texts_to(chat_id).pop().unwrap_or_default()
    }

    fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl TelegramApi for FakeTelegram {
    async fn get_updates(
        &self,
        offset: Option<i64>,
        _timeout_secs: u64,
    ) -> Result<Vec<Update>, TelegramError> {
        self.offsets.lock().unwrap().push(offset);
        let batch = self.updates.lock().unwrap().pop_front();
        match batch {
            Some(batch) => Ok(batch),
            None => {
                tokio::time::sleep(Duration::from_millis(10)).await;
                Ok(Vec::new())
            }
        }
    }

    async fn send_message(&self, message: OutgoingMessage) -> Result<(), TelegramError> {
        if self.blocked.contains(&message.chat_id) {
            return Err(TelegramError::Api {
                code: 403,
                description: "Forbidden: bot was blocked by the user".to_string(),
            });
        }
        self.sent.lock().unwrap().push(Sent::Message(message));
        Ok(())
    }

    async fn edit_message_text(
        &self,
        chat_id: i64,
        _message_id: i64,
        text: &str,
    ) -> Result<(), TelegramError> {
        self.sent.lock().unwrap().push(Sent::Edit {
            chat_id,
            text: text.to_string(),
        });
        Ok(())
    }

    async fn delete_message(&self, chat_id: i64, _message_id: i64) -> Result<(), TelegramError> {
        self.sent.lock().unwrap().push(Sent::Delete { chat_id });
        Ok(())
    }

    async fn answer_callback_query(&self, _callback_query_id: &str) -> Result<(), TelegramError> {
        Ok(())
    }

    async fn send_document(
        &self,
        chat_id: i64,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> Result<(), TelegramError> {
        self.sent.lock().unwrap().push(Sent::Document {
            chat_id,
            file_name: file_name.to_string(),
            size: bytes.len(),
        });
        Ok(())
    }
}

/// Tokens starting with `good` belong to LMS user 7; `down` simulates an outage.
struct FakeLms {
    courses: Vec<Course>,
    assignments: Vec<(i64, Assignment)>,
    delay: Duration,
}

impl FakeLms {
    fn with_deadlines() -> Self {
        let now = Utc::now();
        let assignment = |id: i64, name: &str, due: chrono::DateTime<Utc>| Assignment {
            id,
            name: name.to_string(),
            due_timestamp: due.timestamp(),
        };
        Self {
            courses: vec![
                Course {
                    id: 1,
                    full_name: "Algorithms".to_string(),
                    short_name: Some("ALG".to_string()),
                },
                Course {
                    id: 2,
                    full_name: "Physics".to_string(),
                    short_name: None,
                },
            ],
            assignments: vec![
                (1, assignment(1, "Lab 2", now + ChronoDuration::days(3))),
                (1, assignment(2, "Lab 1", now + ChronoDuration::hours(5))),
                (1, assignment(3, "Midterm", now + ChronoDuration::days(1))),
                (2, assignment(4, "Old problem set", now - ChronoDuration::days(1))),
                (2, assignment(5, "Problem set", now + ChronoDuration::days(10))),
            ],
            delay: Duration::ZERO,
        }
    }
}

#[async_trait]
impl LmsApi for FakeLms {
    async fn site_info(&self, token: &str) -> Result<SiteInfo, LmsError> {
        tokio::time::sleep(self.delay).await;
        if token == "down" {
            return Err(LmsError::Status(reqwest::StatusCode::BAD_GATEWAY));
        }
        if !token.starts_with("good") {
            return Err(LmsError::Api {
                errorcode: "invalidtoken".to_string(),
                message: "Invalid token - token not found".to_string(),
            });
        }
        Ok(SiteInfo {
            userid: Some(STUDENT_ID),
            fullname: Some("Student".to_string()),
            sitename: None,
        })
    }

    async fn user_courses(&self, _token: &str, _user_id: i64) -> Result<Vec<Course>, LmsError> {
        Ok(self.courses.clone())
    }

    async fn course_assignments(
        &self,
        _token: &str,
        course_id: i64,
    ) -> Result<Vec<Assignment>, LmsError> {
        Ok(self
            .assignments
            .iter()
            .filter(|(course, _)| *course == course_id)
            .map(|(_, a)| a.clone())
            .collect())
    }
}

struct Harness {
    ctx: BotContext,
    telegram: Arc<FakeTelegram>,
    _dir: TempDir,
}

async fn harness_with(lms: FakeLms, telegram: FakeTelegram) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let database_url = format!("sqlite://{}", dir.path().join("users.db").display());
    let pool = db::connect(&database_url).await.unwrap();
    db::migrate(&pool).await.unwrap();

    let config = BotConfig {
        telegram_bot_token: "123:abc".to_string(),
        telegram_api_url: "https://api.telegram.org".to_string(),
        lms_url: "https://lms.example.edu/webservice/rest/server.php".to_string(),
        admin_chat_id: ADMIN_ID,
        database_url,
        display_utc_offset_hours: 5,
        request_timeout_secs: 10,
        max_concurrent_requests: 4,
        session_ttl_secs: 900,
        poll_timeout_secs: 1,
        token_help_url: Some("https://lms.example.edu/user/managetoken.php".to_string()),
        credential_encryption_key: None,
        log_dir: dir.path().join("logs").display().to_string(),
    };
    let telegram = Arc::new(telegram);
    let ctx = BotContext::new(
        Arc::new(config),
        telegram.clone(),
        Arc::new(lms),
        CredentialStore::new(pool, None),
    );
    Harness {
        ctx,
        telegram,
        _dir: dir,
    }
}

async fn harness() -> Harness {
    harness_with(FakeLms::with_deadlines(), FakeTelegram::default()).await
}

fn user(id: i64) -> User {
    User {
        id,
        is_bot: false,
        first_name: "Aida".to_string(),
        language_code: Some("en".to_string()),
    }
}

fn message_in(chat_id: i64, kind: ChatKind, from: i64, text: &str) -> Message {
    Message {
        message_id: 1,
        from: Some(user(from)),
        chat: Chat {
            id: chat_id,
            kind,
            title: None,
        },
        text: Some(text.to_string()),
    }
}

fn private_text(update_id: i64, chat_id: i64, text: &str) -> Update {
    Update {
        update_id,
        message: Some(message_in(chat_id, ChatKind::Private, chat_id, text)),
        callback_query: None,
    }
}

fn group_text(update_id: i64, from: i64, text: &str) -> Update {
    Update {
        update_id,
        message: Some(message_in(GROUP_ID, ChatKind::Supergroup, from, text)),
        callback_query: None,
    }
}

fn callback(update_id: i64, chat_id: i64, data: &str) -> Update {
    Update {
        update_id,
        message: None,
        callback_query: Some(CallbackQuery {
            id: format!("cb-{update_id}"),
            from: user(chat_id),
            message: Some(message_in(chat_id, ChatKind::Private, chat_id, "Your token")),
            data: Some(data.to_string()),
        }),
    }
}

#[tokio::test]
async fn test_registration_flow() {
    let h = harness().await;

    handle_update(&h.ctx, private_text(1, STUDENT_ID, "/start")).await;
    let sent = h.telegram.sent();
    let Some(Sent::Message(welcome)) = sent.last() else {
        panic!("expected a welcome message, got {sent:?}");
    };
    assert!(welcome.parse_mode.is_some());
    assert!(welcome.text.contains("managetoken.php"));

    handle_update(&h.ctx, private_text(2, STUDENT_ID, "wrong-token")).await;
    assert_eq!(
        h.telegram.last_text_to(STUDENT_ID),
        "Invalid token. Please try again."
    );

    handle_update(&h.ctx, private_text(3, STUDENT_ID, "down")).await;
    assert!(h.telegram.last_text_to(STUDENT_ID).contains("not responding"));

    handle_update(&h.ctx, private_text(4, STUDENT_ID, "  good-token  ")).await;
    assert_eq!(
        h.telegram.last_text_to(STUDENT_ID),
        "Thank you! Your token has been registered."
    );
    assert_eq!(
        h.ctx.store.get(STUDENT_ID).await.unwrap().as_deref(),
        Some("good-token")
    );
    let record = h.ctx.store.get_record(STUDENT_ID).await.unwrap().unwrap();
    assert_eq!(record.first_name, "Aida");

    // registered users go straight to the menu
    handle_update(&h.ctx, private_text(5, STUDENT_ID, "/start")).await;
    assert_eq!(h.telegram.last_text_to(STUDENT_ID), "Choose an action:");
}

#[tokio::test]
async fn test_private_deadline_digest() {
    let h = harness().await;

    handle_update(&h.ctx, private_text(1, STUDENT_ID, "Deadlines")).await;
    assert_eq!(
        h.telegram.last_text_to(STUDENT_ID),
        "Please provide a token first! Send it to me as a message."
    );

    h.ctx.store.put(STUDENT_ID, "Aida", "good-token").await.unwrap();
    handle_update(&h.ctx, private_text(2, STUDENT_ID, "deadlines")).await;

    let digest = h.telegram.last_text_to(STUDENT_ID);
    assert!(digest.starts_with("1. "), "{digest}");
    assert!(digest.contains("📝 Lab 1 is due - Algorithms"), "{digest}");
    assert!(digest.contains("3. "), "{digest}");
    assert!(digest.contains("📝 Problem set is due - Physics"), "{digest}");
    assert!(!digest.contains("Midterm"), "{digest}");
    assert!(!digest.contains("Old problem set"), "{digest}");
    assert!(digest.contains("hours,"), "{digest}");
    assert!(digest.contains("days left)"), "{digest}");

    let lab_1 = digest.find("Lab 1").unwrap();
    let lab_2 = digest.find("Lab 2").unwrap();
    assert!(lab_1 < lab_2);
}

#[tokio::test]
async fn test_unregistered_request_opens_token_prompt() {
    let h = harness().await;

    handle_update(&h.ctx, private_text(1, STUDENT_ID, "Deadlines")).await;
    assert_eq!(
        h.telegram.last_text_to(STUDENT_ID),
        "Please provide a token first! Send it to me as a message."
    );
    handle_update(&h.ctx, private_text(2, STUDENT_ID, "good-token")).await;
    assert_eq!(
        h.telegram.last_text_to(STUDENT_ID),
        "Thank you! Your token has been registered."
    );
    assert_eq!(
        h.ctx.store.get(STUDENT_ID).await.unwrap().as_deref(),
        Some("good-token")
    );

    // same for the profile button
    h.ctx.store.delete(STUDENT_ID).await.unwrap();
    handle_update(&h.ctx, private_text(3, STUDENT_ID, "👤Profile")).await;
    handle_update(&h.ctx, private_text(4, STUDENT_ID, "good-token-2")).await;
    assert_eq!(
        h.ctx.store.get(STUDENT_ID).await.unwrap().as_deref(),
        Some("good-token-2")
    );
}

#[tokio::test]
async fn test_duplicate_deadline_request_is_suppressed() {
    let mut lms = FakeLms::with_deadlines();
    lms.delay = Duration::from_millis(200);
    let h = harness_with(lms, FakeTelegram::default()).await;
    h.ctx.store.put(STUDENT_ID, "Aida", "good-token").await.unwrap();

    tokio::join!(
        handle_update(&h.ctx, private_text(1, STUDENT_ID, "Deadlines")),
        handle_update(&h.ctx, private_text(2, STUDENT_ID, "Deadlines")),
    );

    let texts = h.telegram.texts_to(STUDENT_ID);
    assert_eq!(texts.len(), 2, "{texts:?}");
    let notices = texts
        .iter()
        .filter(|t| t.as_str() == "Your deadlines are already on the way, please wait.")
        .count();
    let digests = texts.iter().filter(|t| t.starts_with("1. ")).count();
    assert_eq!((notices, digests), (1, 1));
    assert!(!h.ctx.guard.is_busy(STUDENT_ID));
}

#[tokio::test]
async fn test_group_deadlines_register_group() {
    let h = harness().await;

    handle_update(&h.ctx, group_text(1, STUDENT_ID, "/deadlines@lms_helper_bot")).await;
    assert_eq!(
        h.telegram.last_text_to(GROUP_ID),
        "Please register your LMS token in a private chat with the bot first."
    );
    assert_eq!(h.ctx.store.list_group_chat_ids().await.unwrap(), vec![GROUP_ID]);

    h.ctx.store.put(STUDENT_ID, "Aida", "good-token").await.unwrap();
    handle_update(&h.ctx, group_text(2, STUDENT_ID, "/deadlines")).await;
    assert!(h.telegram.last_text_to(GROUP_ID).starts_with("1. "));

    // other chatter in groups is ignored
    let before = h.telegram.sent().len();
    handle_update(&h.ctx, group_text(3, STUDENT_ID, "hello everyone")).await;
    assert_eq!(h.telegram.sent().len(), before);
    assert_eq!(h.ctx.store.list_group_chat_ids().await.unwrap(), vec![GROUP_ID]);
}

#[tokio::test]
async fn test_scholarship_calculator_conversation() {
    let h = harness().await;

    handle_update(&h.ctx, private_text(1, STUDENT_ID, "Calculator")).await;
    handle_update(&h.ctx, private_text(2, STUDENT_ID, "GPA")).await;
    assert_eq!(h.telegram.last_text_to(STUDENT_ID), "Will be added soon!");

    handle_update(&h.ctx, private_text(3, STUDENT_ID, "Scholarship")).await;
    assert!(h.telegram.last_text_to(STUDENT_ID).contains("Mid-Term"));

    handle_update(&h.ctx, private_text(4, STUDENT_ID, "fifty")).await;
    assert_eq!(
        h.telegram.last_text_to(STUDENT_ID),
        "Invalid input. Please enter a number from 0 to 100."
    );

    handle_update(&h.ctx, private_text(5, STUDENT_ID, "50")).await;
    assert!(h.telegram.last_text_to(STUDENT_ID).contains("End-Term"));

    handle_update(&h.ctx, private_text(6, STUDENT_ID, "150")).await;
    assert_eq!(
        h.telegram.last_text_to(STUDENT_ID),
        "Please enter a valid grade from 0 to 100."
    );

    handle_update(&h.ctx, private_text(7, STUDENT_ID, "50,0")).await;
    let result = h.telegram.last_text_to(STUDENT_ID);
    assert!(result.contains("(>50): 50%"), "{result}");
    assert!(result.contains("(>70): 100%"), "{result}");
    assert!(result.contains("Unreachable"), "{result}");
    assert!(result.contains("70%"), "{result}");

    // conversation finished, numbers are no longer calculator input
    handle_update(&h.ctx, private_text(8, STUDENT_ID, "50")).await;
    assert_eq!(
        h.telegram.last_text_to(STUDENT_ID),
        "I don't know that command. Please use the menu buttons."
    );
}

#[tokio::test]
async fn test_calculator_exit_returns_to_menu() {
    let h = harness().await;
    handle_update(&h.ctx, private_text(1, STUDENT_ID, "Scholarship")).await;
    handle_update(&h.ctx, private_text(2, STUDENT_ID, "exit")).await;
    assert_eq!(h.telegram.last_text_to(STUDENT_ID), "Choose an action:");
}

#[tokio::test]
async fn test_profile_delete_and_modify() {
    let h = harness().await;
    h.ctx.store.put(STUDENT_ID, "Aida", "good-token").await.unwrap();

    handle_update(&h.ctx, private_text(1, STUDENT_ID, "👤Profile")).await;
    assert!(h.telegram.last_text_to(STUDENT_ID).contains("good-token"));

    handle_update(&h.ctx, callback(2, STUDENT_ID, "token_modify")).await;
    assert_eq!(
        h.telegram.last_text_to(STUDENT_ID),
        "Please provide your new token:"
    );
    handle_update(&h.ctx, private_text(3, STUDENT_ID, "good-token-2")).await;
    assert_eq!(
        h.telegram.last_text_to(STUDENT_ID),
        "Your token has been updated."
    );
    assert_eq!(
        h.ctx.store.get(STUDENT_ID).await.unwrap().as_deref(),
        Some("good-token-2")
    );

    handle_update(&h.ctx, callback(4, STUDENT_ID, "token_delete")).await;
    assert!(!h.ctx.store.is_registered(STUDENT_ID).await.unwrap());
    let texts = h.telegram.texts_to(STUDENT_ID);
    assert!(texts.contains(&"Your token is deleted!".to_string()));
    // back to the registration prompt
    assert!(h.telegram.last_text_to(STUDENT_ID).starts_with("Welcome"));

    handle_update(&h.ctx, callback(5, STUDENT_ID, "token_exit")).await;
    assert!(
        h.telegram
            .sent()
            .iter()
            .any(|s| matches!(s, Sent::Delete { chat_id } if *chat_id == STUDENT_ID))
    );
}

#[tokio::test]
async fn test_admin_only_actions() {
    let h = harness().await;
    handle_update(&h.ctx, private_text(1, STUDENT_ID, "Users")).await;
    assert_eq!(h.telegram.last_text_to(STUDENT_ID), "You are not admin!");
    handle_update(&h.ctx, private_text(2, STUDENT_ID, "Broadcast")).await;
    assert_eq!(h.telegram.last_text_to(STUDENT_ID), "You are not admin!");
}

#[tokio::test]
async fn test_admin_exports_database() {
    let h = harness().await;
    h.ctx.store.put(STUDENT_ID, "Aida", "good-token").await.unwrap();

    handle_update(&h.ctx, private_text(1, ADMIN_ID, "🔑Admin")).await;
    assert_eq!(h.telegram.last_text_to(ADMIN_ID), "Admin panel.");

    handle_update(&h.ctx, private_text(2, ADMIN_ID, "Users")).await;
    let document = h.telegram.sent().into_iter().find_map(|s| match s {
        Sent::Document {
            chat_id,
            file_name,
            size,
        } => Some((chat_id, file_name, size)),
        _ => None,
    });
    let (chat_id, file_name, size) = document.expect("database export");
    assert_eq!(chat_id, ADMIN_ID);
    assert_eq!(file_name, "users.db");
    assert!(size > 0);
}

#[tokio::test]
async fn test_admin_broadcast_counts_failures() {
    let telegram = FakeTelegram {
        blocked: vec![8],
        ..FakeTelegram::default()
    };
    let h = harness_with(FakeLms::with_deadlines(), telegram).await;
    for chat_id in [STUDENT_ID, 8, 9] {
        h.ctx.store.put(chat_id, "Student", "good-token").await.unwrap();
    }

    handle_update(&h.ctx, private_text(1, ADMIN_ID, "Broadcast")).await;
    handle_update(&h.ctx, private_text(2, ADMIN_ID, "Individual chats")).await;
    assert_eq!(h.telegram.last_text_to(ADMIN_ID), "Enter your message:");

    handle_update(&h.ctx, private_text(3, ADMIN_ID, "Exam schedule is out")).await;
    assert_eq!(
        h.telegram.last_text_to(ADMIN_ID),
        "Broadcast finished: 2 delivered, 1 failed."
    );
    assert_eq!(h.telegram.last_text_to(STUDENT_ID), "Exam schedule is out");
    assert_eq!(h.telegram.last_text_to(9), "Exam schedule is out");

    // exit cancels a pending broadcast
    handle_update(&h.ctx, private_text(4, ADMIN_ID, "Group chats")).await;
    handle_update(&h.ctx, private_text(5, ADMIN_ID, "Exit")).await;
    assert_eq!(h.telegram.last_text_to(ADMIN_ID), "Broadcast canceled.");
}

#[tokio::test]
async fn test_admin_broadcast_to_groups() {
    let h = harness().await;
    h.ctx.store.put(STUDENT_ID, "Aida", "good-token").await.unwrap();
    assert!(h.ctx.store.register_group_chat(GROUP_ID).await.unwrap());

    handle_update(&h.ctx, private_text(1, ADMIN_ID, "Group chats")).await;
    handle_update(&h.ctx, private_text(2, ADMIN_ID, "Lecture moved to room 204")).await;

    assert_eq!(
        h.telegram.last_text_to(ADMIN_ID),
        "Broadcast finished: 1 delivered, 0 failed."
    );
    assert_eq!(h.telegram.last_text_to(GROUP_ID), "Lecture moved to room 204");
    // individual chats are not part of a group broadcast
    assert!(h.telegram.texts_to(STUDENT_ID).is_empty());
}

#[tokio::test]
async fn test_russian_locale() {
    let h = harness().await;
    let mut update = private_text(1, STUDENT_ID, "Users");
    if let Some(message) = update.message.as_mut() {
        if let Some(from) = message.from.as_mut() {
            from.language_code = Some("ru".to_string());
        }
    }
    handle_update(&h.ctx, update).await;
    assert_eq!(h.telegram.last_text_to(STUDENT_ID), "Вы не администратор!");
}

#[tokio::test]
async fn test_dispatcher_polls_and_advances_offset() {
    let telegram = FakeTelegram::default();
    telegram.updates.lock().unwrap().extend([
        vec![
            private_text(10, STUDENT_ID, "Calculator"),
            private_text(11, ADMIN_ID, "🔑Admin"),
        ],
        vec![private_text(12, 42, "what is this")],
    ]);
    let h = harness_with(FakeLms::with_deadlines(), telegram).await;

    Dispatcher::new(h.ctx.clone())
        .run_until(tokio::time::sleep(Duration::from_millis(300)))
        .await;

    let offsets = h.telegram.offsets.lock().unwrap().clone();
    assert_eq!(offsets[0], None);
    assert_eq!(offsets[1], Some(12));
    assert_eq!(offsets[2], Some(13));

    assert!(h.telegram.last_text_to(STUDENT_ID).contains("Choose a calculator"));
    assert_eq!(h.telegram.last_text_to(ADMIN_ID), "Admin panel.");
    assert_eq!(
        h.telegram.last_text_to(42),
        "I don't know that command. Please use the menu buttons."
    );
}
