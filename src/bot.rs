use std::fmt;
use std::sync::Arc;

use tracing::{debug, error, info};

use crate::bills::{bill_url, BillLookup, BillRecord, BillStore};
use crate::config::TelegramConfig;
use crate::llm::Explainer;
use crate::platform::update::IncomingUpdate;
use crate::platform::{bill_callback_data, deliver, Messenger, OutgoingMessage, BILL_CALLBACK_PREFIX};
use crate::prompt::build_prompt;

pub const WELCOME_TEXT: &str = "👋 Привет! Я объясняю законопроекты Госдумы простым языком.\n\n\
Пришли номер законопроекта (например, 1052810-8) или ссылку на sozd.duma.gov.ru, \
и я расскажу, что он меняет и кого коснётся.\n\
Можно просто написать слово, например «пенсии», и я поищу подходящие законопроекты.\n\n\
/help — как пользоваться\n\
/about — что я умею";

pub const HELP_TEXT: &str = "ℹ️ Как пользоваться:\n\n\
1. Отправь номер законопроекта: 1052810-8\n\
2. Или ссылку: https://sozd.duma.gov.ru/bill/1052810-8\n\
3. Или слово для поиска: пенсии, налоги, штрафы\n\n\
По слову я покажу до 10 законопроектов с кнопками. Нажми на кнопку, чтобы получить объяснение.";

pub const ABOUT_TEXT: &str = "🤖 Я читаю название и описание законопроекта из своей базы \
и пересказываю его простыми словами, с примерами из жизни и щепоткой юмора.\n\n\
Я не юрист: за точными формулировками открывай карточку законопроекта на sozd.duma.gov.ru.";

pub const PLEASE_WAIT_TEXT: &str =
    "⏳ Нашёл подходящие законопроекты. Нажми на кнопку с номером, чтобы получить объяснение.";

pub const NOTHING_FOUND_TEXT: &str = "🤷 Не смог распознать номер законопроекта и ничего не нашёл по этому слову. \
Попробуй сократить слово, например «пенси» вместо «пенсионеров».";

pub const LLM_FAILURE_TEXT: &str =
    "😔 Не получилось подготовить объяснение: сервис ответов сейчас недоступен. Попробуй ещё раз чуть позже.";

/// Description length shown under a search hit.
const SNIPPET_CHARS: usize = 300;

pub fn not_in_database_text(number: &str) -> String {
    format!(
        "🔎 Нашёл номер {}, но такого законопроекта нет в моей базе.\nПроверь номер или открой карточку: {}",
        number,
        bill_url(number)
    )
}

/// What happened to an update, as recorded in the audit chat.
#[derive(Debug, Clone, PartialEq)]
enum Outcome {
    Welcome,
    Help,
    About,
    Explained(String),
    LlmFailed(String),
    UnknownBill(String),
    SearchHits(usize),
    NothingFound,
    IgnoredCallback,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Welcome => write!(f, "start"),
            Outcome::Help => write!(f, "help"),
            Outcome::About => write!(f, "about"),
            Outcome::Explained(number) => write!(f, "explained {}", number),
            Outcome::LlmFailed(number) => write!(f, "llm error {}", number),
            Outcome::UnknownBill(number) => write!(f, "unknown bill {}", number),
            Outcome::SearchHits(n) => write!(f, "search: {} found", n),
            Outcome::NothingFound => write!(f, "search: nothing found"),
            Outcome::IgnoredCallback => write!(f, "callback ignored"),
        }
    }
}

/// Routes one webhook update to the right reply.
///
/// Holds no per-request state: the bill store is immutable and the explainer
/// and messenger are injected, so tests swap them for fakes.
pub struct Dispatcher {
    store: Arc<BillStore>,
    explainer: Arc<dyn Explainer>,
    messenger: Arc<dyn Messenger>,
    admin_chat_id: i64,
    log_chat_id: i64,
}

impl Dispatcher {
    pub fn new(
        store: Arc<BillStore>,
        explainer: Arc<dyn Explainer>,
        messenger: Arc<dyn Messenger>,
        telegram: &TelegramConfig,
    ) -> Self {
        Self {
            store,
            explainer,
            messenger,
            admin_chat_id: telegram.admin_chat_id,
            log_chat_id: telegram.log_chat_id,
        }
    }

    /// Handle one update end to end. Never fails: outbound errors are logged.
    pub async fn dispatch(&self, update: IncomingUpdate) {
        match update {
            IncomingUpdate::Callback {
                query_id,
                chat_id,
                sender,
                data,
            } => {
                info!("Callback from {} ({}): {}", sender, chat_id, data);
                let outcome = self.handle_callback(chat_id, &query_id, &data).await;
                self.audit(&sender, chat_id, &data, &outcome).await;
            }
            IncomingUpdate::Command {
                chat_id,
                sender,
                command,
                text,
            } => {
                info!("Command from {} ({}): {}", sender, chat_id, text);
                let outcome = match self.handle_command(chat_id, &command).await {
                    Some(outcome) => outcome,
                    None => self.handle_text(chat_id, &text).await,
                };
                self.audit(&sender, chat_id, &text, &outcome).await;
            }
            IncomingUpdate::Text {
                chat_id,
                sender,
                text,
            } => {
                info!("Message from {} ({}): {}", sender, chat_id, text);
                let outcome = self.handle_text(chat_id, &text).await;
                self.audit(&sender, chat_id, &text, &outcome).await;
            }
            IncomingUpdate::Unrecognized => {
                debug!("Ignoring update without chat or text");
            }
        }
    }

    /// Known commands only; None lets the text path handle it.
    async fn handle_command(&self, chat_id: i64, command: &str) -> Option<Outcome> {
        let (reply, outcome) = match command {
            "/start" => (WELCOME_TEXT, Outcome::Welcome),
            "/help" => (HELP_TEXT, Outcome::Help),
            "/about" => (ABOUT_TEXT, Outcome::About),
            _ => return None,
        };
        self.send(OutgoingMessage::text(chat_id, reply)).await;
        Some(outcome)
    }

    async fn handle_text(&self, chat_id: i64, text: &str) -> Outcome {
        match self.store.find_bill(text) {
            BillLookup::Found { number, record } => {
                self.explain_bill(chat_id, &number, Some(record)).await
            }
            BillLookup::Unknown { number } => {
                self.send(OutgoingMessage::text(chat_id, not_in_database_text(&number)))
                    .await;
                Outcome::UnknownBill(number)
            }
            BillLookup::NoNumber => self.send_search_results(chat_id, text).await,
        }
    }

    async fn handle_callback(&self, chat_id: i64, query_id: &str, data: &str) -> Outcome {
        let outcome = match data.strip_prefix(BILL_CALLBACK_PREFIX) {
            Some(number) if !number.is_empty() => {
                let record = self.store.find_by_number(number);
                self.explain_bill(chat_id, number, record).await
            }
            _ => Outcome::IgnoredCallback,
        };

        deliver(
            "answerCallbackQuery",
            self.messenger.answer_callback(query_id),
        )
        .await;

        outcome
    }

    async fn explain_bill(
        &self,
        chat_id: i64,
        number: &str,
        record: Option<&BillRecord>,
    ) -> Outcome {
        let url = match record {
            Some(record) => record.resolved_url(),
            None => bill_url(number),
        };
        let prompt = build_prompt(number, &url, record);

        match self.explainer.explain(&prompt, number).await {
            Ok(answer) => {
                self.send(OutgoingMessage::text(chat_id, answer)).await;
                Outcome::Explained(number.to_string())
            }
            Err(e) => {
                error!("Explanation for {} failed: {:#}", number, e);
                self.send(OutgoingMessage::text(chat_id, LLM_FAILURE_TEXT)).await;
                self.notify_admin(&format!(
                    "⚠️ Не удалось объяснить {} для чата {}: {:#}",
                    number, chat_id, e
                ))
                .await;
                Outcome::LlmFailed(number.to_string())
            }
        }
    }

    async fn send_search_results(&self, chat_id: i64, query: &str) -> Outcome {
        let hits = self.store.search(query);
        if hits.is_empty() {
            self.send(OutgoingMessage::text(chat_id, NOTHING_FOUND_TEXT)).await;
            return Outcome::NothingFound;
        }

        self.send(OutgoingMessage::text(chat_id, PLEASE_WAIT_TEXT)).await;
        for bill in &hits {
            let message = OutgoingMessage::text(chat_id, search_hit_text(bill))
                .with_button(bill.button_label(), bill_callback_data(&bill.number));
            self.send(message).await;
        }

        Outcome::SearchHits(hits.len())
    }

    async fn send(&self, message: OutgoingMessage) {
        deliver("sendMessage", self.messenger.send_message(&message)).await;
    }

    async fn notify_admin(&self, text: &str) {
        if self.admin_chat_id == 0 {
            return;
        }
        self.send(OutgoingMessage::plain(self.admin_chat_id, text))
            .await;
    }

    async fn audit(&self, sender: &str, chat_id: i64, text: &str, outcome: &Outcome) {
        if self.log_chat_id == 0 {
            return;
        }
        let line = format!(
            "👤 {} (chat {})\n💬 {}\n➡️ {}",
            sender, chat_id, text, outcome
        );
        self.send(OutgoingMessage::plain(self.log_chat_id, line)).await;
    }
}

fn search_hit_text(bill: &BillRecord) -> String {
    let title = if bill.title.is_empty() {
        format!("Законопроект № {}", bill.number)
    } else {
        bill.title.clone()
    };

    if bill.description.is_empty() {
        return format!("📄 {}", title);
    }

    let mut snippet: String = bill.description.chars().take(SNIPPET_CHARS).collect();
    if bill.description.chars().count() > SNIPPET_CHARS {
        snippet.push('…');
    }
    format!("📄 {}\n\n{}", title, snippet)
}
