//! Interactive estimate consultation.

use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    terminal::{disable_raw_mode, enable_raw_mode},
};
use tracing::warn;

use crate::ai::gemini::backend_from_credentials;
use crate::ai::transport::ChatTransport;
use crate::ai::usage::CostSettings;
use crate::ai::Turn;
use crate::cli::render::{render_estimate, render_message};
use crate::estimate::extract::AiReply;
use crate::estimate::promotion::{interpret_reply, verify_extension_discount, PromotionMode};
use crate::prompts::system::{build_system_instruction, LocalizationSettings};
use crate::prompts::templates::TemplateRegistry;
use crate::store::conversation::ConversationStore;
use crate::store::estimate::EstimateStore;
use crate::store::persist::{FilePersistence, SharedPersistence};

/// Turn kind selectable from the command line.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ModeArg {
    /// Regular estimation.
    Estimate,
    /// 8-week extension with 20% discount.
    ExtendDiscount,
    /// Reduced-scope alternatives.
    BudgetReduction,
    /// Strategic feature suggestions.
    FeatureSuggestion,
}

impl From<ModeArg> for PromotionMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Estimate => PromotionMode::Estimate,
            ModeArg::ExtendDiscount => PromotionMode::ExtendDiscount,
            ModeArg::BudgetReduction => PromotionMode::BudgetReduction,
            ModeArg::FeatureSuggestion => PromotionMode::FeatureSuggestion,
        }
    }
}

/// Opens the persistence backend for state commands.
pub(crate) fn open_persistence(state_dir: Option<PathBuf>) -> Result<SharedPersistence> {
    let persistence = match state_dir {
        Some(dir) => FilePersistence::new(dir),
        None => FilePersistence::default_location()?,
    };
    Ok(Arc::new(persistence))
}

/// Interactive estimate consultation.
#[derive(Parser)]
pub struct ChatCommand {
    /// Gemini model to use (overrides GEMINI_MODEL).
    #[arg(long)]
    pub model: Option<String>,

    /// Template combined with the first message of the session.
    #[arg(long)]
    pub template: Option<String>,

    /// Reply language code.
    #[arg(long, default_value = "ko")]
    pub language: String,

    /// Currency code for amounts.
    #[arg(long, default_value = "KRW")]
    pub currency: String,

    /// Country name.
    #[arg(long, default_value = "South Korea")]
    pub country: String,

    /// File whose content becomes the <DATA> block (price table, rules).
    #[arg(long)]
    pub data_file: Option<PathBuf>,

    /// Turn kind for the first message.
    #[arg(long, value_enum, default_value_t = ModeArg::Estimate)]
    pub mode: ModeArg,

    /// Directory for conversation state (default: ~/.ai-esti/state).
    #[arg(long)]
    pub state_dir: Option<PathBuf>,
}

impl ChatCommand {
    /// Executes the chat command.
    pub async fn execute(self) -> Result<()> {
        let credentials = crate::utils::preflight::check_ai_credentials(self.model.as_deref())?;

        let data = match &self.data_file {
            Some(path) => Some(
                std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read data file: {}", path.display()))?,
            ),
            None => None,
        };
        let localization = LocalizationSettings {
            primary_language_code: Some(self.language.clone()),
            primary_currency_code: Some(self.currency.clone()),
            user_country_name: Some(self.country.clone()),
            ..LocalizationSettings::default()
        };
        let instruction = build_system_instruction(Some(&localization), data.as_deref())?;

        let backend = backend_from_credentials(&credentials)?;
        let mut transport = ChatTransport::new(Box::new(backend), credentials.model.clone())
            .with_cost_settings(CostSettings::from_env());
        transport.configure(credentials.model.clone(), Some(instruction));

        let persistence = open_persistence(self.state_dir)?;
        let mut session = ConsultSession::new(
            TemplateRegistry::builtin(),
            transport,
            ConversationStore::load(persistence.clone()),
            EstimateStore::load(persistence),
        );
        session.template_override = self.template;
        session.mode = self.mode.into();
        session.resume();

        eprintln!("Connected to Gemini (model: {})", credentials.model);
        if session.transport.has_session() {
            eprintln!("Resuming the saved conversation (ai-esti history clear to start over).");
        }
        eprintln!("Enter to send, Shift+Enter for newline, Ctrl+D to exit. /help for commands.\n");
        for message in session.conversation.messages() {
            eprintln!("{}", render_message(message));
        }

        chat_loop(&mut session).await
    }
}

/// Conversation state plus the pipeline that drives one turn.
pub(crate) struct ConsultSession {
    registry: TemplateRegistry,
    transport: ChatTransport,
    pub(crate) conversation: ConversationStore,
    pub(crate) estimates: EstimateStore,
    pub(crate) mode: PromotionMode,
    pub(crate) template_override: Option<String>,
    template_sent: bool,
}

impl ConsultSession {
    pub(crate) fn new(
        registry: TemplateRegistry,
        transport: ChatTransport,
        conversation: ConversationStore,
        estimates: EstimateStore,
    ) -> Self {
        Self {
            registry,
            transport,
            conversation,
            estimates,
            mode: PromotionMode::Estimate,
            template_override: None,
            template_sent: false,
        }
    }

    /// Replays the completed exchanges of the persisted log into the model
    /// session.
    ///
    /// The log keeps raw user input only, so the template goes out again with
    /// the next message.
    pub(crate) fn resume(&mut self) {
        let turns: Vec<Turn> = self
            .conversation
            .completed_exchanges()
            .into_iter()
            .flat_map(|(user, reply)| {
                [
                    Turn::user(user.content.clone()),
                    Turn::model(reply.content.clone()),
                ]
            })
            .collect();
        if !turns.is_empty() {
            self.transport.resume_session(turns);
        }
    }

    /// Sends one user message and records the outcome.
    ///
    /// The template is prepended to every promotion request and to regular
    /// messages until one carrying it has gone through.
    pub(crate) async fn submit(&mut self, input: &str) -> Result<AiReply> {
        let mode = self.mode;
        let original = self.estimates.current().cloned();

        let request = mode
            .request_text(input, original.as_ref())
            .context("Failed to serialize the current estimate")?;
        let with_template = mode != PromotionMode::Estimate || !self.template_sent;
        let prompt = if with_template {
            let template_id = match (&self.template_override, mode) {
                (Some(id), PromotionMode::Estimate) => id.as_str(),
                _ => mode.template_id(),
            };
            self.registry.combine(template_id, &request)
        } else {
            request
        };

        self.conversation.begin_turn(input);
        let raw = match self.transport.send_turn(&prompt).await {
            Ok(raw) => raw,
            Err(e) => {
                self.conversation
                    .fail_last_message(format!("Request failed: {e}"));
                return Err(e);
            }
        };
        self.conversation.update_last_message(raw.clone());
        if mode == PromotionMode::Estimate {
            self.template_sent = true;
        }

        let reply = interpret_reply(mode, &raw);
        if let Some(estimate) = &reply.estimate {
            if let (PromotionMode::ExtendDiscount, Some(original)) = (mode, &original) {
                if let Err(mismatch) = verify_extension_discount(original, estimate) {
                    warn!(%mismatch, "Model applied the extension discount differently");
                }
            }
            self.estimates.replace(estimate.clone());
        }

        // Promotion requests are one-off; later messages continue normally.
        self.mode = PromotionMode::Estimate;
        Ok(reply)
    }

    /// Forgets the conversation, the estimate and the model session.
    pub(crate) fn clear(&mut self) {
        self.conversation.clear();
        self.estimates.clear();
        self.transport.reset_session();
        self.template_sent = false;
    }
}

/// Slash commands available inside the chat loop.
enum SlashCommand {
    Help,
    Clear,
    Show,
    Period(u32),
    Mode(PromotionMode),
    Unknown(String),
}

fn parse_slash_command(input: &str) -> Option<SlashCommand> {
    let rest = input.strip_prefix('/')?;
    let mut parts = rest.split_whitespace();
    let name = parts.next().unwrap_or_default();
    let arg = parts.next();

    Some(match (name, arg) {
        ("help", _) => SlashCommand::Help,
        ("clear", _) => SlashCommand::Clear,
        ("show", _) => SlashCommand::Show,
        ("period", Some(weeks)) => match weeks.parse() {
            Ok(weeks) => SlashCommand::Period(weeks),
            Err(_) => SlashCommand::Unknown(input.to_string()),
        },
        ("mode", Some(mode)) => match ModeArg::from_str(mode, true) {
            Ok(mode) => SlashCommand::Mode(mode.into()),
            Err(_) => SlashCommand::Unknown(input.to_string()),
        },
        _ => SlashCommand::Unknown(input.to_string()),
    })
}

const CHAT_HELP: &str = "\
/show                  show the current estimate
/period <weeks>        adjust the displayed period
/mode <mode>           estimate | extend-discount | budget-reduction | feature-suggestion
/clear                 forget the conversation and estimate
/help                  this help";

async fn chat_loop(session: &mut ConsultSession) -> Result<()> {
    loop {
        let input = match read_user_input() {
            Ok(Some(text)) => text,
            Ok(None) => {
                eprintln!("\nGoodbye!");
                break;
            }
            Err(e) => {
                eprintln!("\nInput error: {e}");
                break;
            }
        };

        let trimmed = input.trim();
        if trimmed.is_empty() {
            continue;
        }

        if let Some(command) = parse_slash_command(trimmed) {
            match command {
                SlashCommand::Help => eprintln!("{CHAT_HELP}"),
                SlashCommand::Clear => {
                    session.clear();
                    eprintln!("Conversation cleared.");
                }
                SlashCommand::Show => match session.estimates.current() {
                    Some(estimate) => println!(
                        "{}\n",
                        render_estimate(estimate, session.estimates.period_weeks())
                    ),
                    None => eprintln!("No estimate yet."),
                },
                SlashCommand::Period(weeks) => {
                    session.estimates.set_period(weeks);
                    eprintln!("Period set to {weeks} weeks.");
                }
                SlashCommand::Mode(mode) => {
                    session.mode = mode;
                    eprintln!("Next message is sent as {mode:?}.");
                }
                SlashCommand::Unknown(text) => eprintln!("Unknown command: {text}"),
            }
            continue;
        }

        // A failed turn is reported but keeps the chat open.
        let reply = match session.submit(trimmed).await {
            Ok(reply) => reply,
            Err(e) => {
                eprintln!("Error: {e}\n");
                continue;
            }
        };

        if !reply.prose.is_empty() {
            println!("{}\n", reply.prose);
        }
        if let Some(estimate) = &reply.estimate {
            println!(
                "{}\n",
                render_estimate(estimate, session.estimates.period_weeks())
            );
        }
        for (index, alternative) in reply.alternatives.iter().enumerate() {
            println!("Alternative {}:\n{}\n", index + 1, render_estimate(alternative, None));
        }
        if !reply.trailing.is_empty() {
            println!("{}\n", reply.trailing);
        }
    }

    Ok(())
}

/// Guard that disables raw mode on drop.
struct RawModeGuard;

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
    }
}

/// Reads multiline user input with "> " prompt.
///
/// Returns `Ok(Some(text))` on Enter, `Ok(None)` on Ctrl+D/Ctrl+C.
fn read_user_input() -> Result<Option<String>> {
    eprint!("> ");
    io::stderr().flush()?;

    enable_raw_mode()?;
    let _guard = RawModeGuard;

    let mut buffer = String::new();

    loop {
        if let Event::Key(key_event) = event::read()? {
            if key_event.kind == KeyEventKind::Release {
                continue;
            }
            match key_event.code {
                KeyCode::Enter => {
                    if key_event.modifiers.contains(KeyModifiers::SHIFT) {
                        buffer.push('\n');
                        eprint!("\r\n... ");
                        io::stderr().flush()?;
                    } else {
                        eprint!("\r\n");
                        io::stderr().flush()?;
                        return Ok(Some(buffer));
                    }
                }
                KeyCode::Char('d') if key_event.modifiers.contains(KeyModifiers::CONTROL) => {
                    if buffer.is_empty() {
                        return Ok(None);
                    }
                    eprint!("\r\n");
                    io::stderr().flush()?;
                    return Ok(Some(buffer));
                }
                KeyCode::Char('c') if key_event.modifiers.contains(KeyModifiers::CONTROL) => {
                    return Ok(None);
                }
                KeyCode::Char(c) => {
                    buffer.push(c);
                    eprint!("{c}");
                    io::stderr().flush()?;
                }
                KeyCode::Backspace => {
                    if buffer.pop().is_some() {
                        eprint!("\x08 \x08");
                        io::stderr().flush()?;
                    }
                }
                _ => {}
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::ai::error::AiError;
    use crate::ai::test_utils::ConfigurableMockBackend;
    use crate::ai::Generation;
    use crate::estimate::extract::render_estimate_block;
    use crate::estimate::model::tests::sample_estimate;
    use crate::observe::RecordingHook;

    fn session(mock: ConfigurableMockBackend) -> ConsultSession {
        let hook = Arc::new(RecordingHook::new());
        let transport =
            ChatTransport::new(Box::new(mock), "gemini-2.5-flash-lite").with_hook(hook.clone());
        ConsultSession::new(
            TemplateRegistry::builtin().with_hook(hook),
            transport,
            ConversationStore::in_memory(),
            EstimateStore::in_memory(),
        )
    }

    #[tokio::test]
    async fn first_turn_uses_template_and_stores_estimate() {
        let block = render_estimate_block(&sample_estimate()).unwrap();
        let reply_text = format!("견적입니다.\n{block}");
        let mock = ConfigurableMockBackend::with_texts(&[&reply_text, "네, 가능합니다."]);
        let requests = mock.request_handle();
        let mut session = session(mock);

        let reply = session.submit("쇼핑몰 견적").await.unwrap();
        assert_eq!(reply.prose, "견적입니다.");
        assert_eq!(session.estimates.current(), Some(&sample_estimate()));
        assert_eq!(session.estimates.period_weeks(), Some(12));

        session.submit("결제도 되나요?").await.unwrap();

        let sent = requests.requests();
        assert!(sent[0].turns[0].text.ends_with("\n\n사용자 입력: 쇼핑몰 견적"));
        assert!(sent[0].turns[0].text.contains("AI 핵심 역할"));
        assert_eq!(sent[1].turns.last().unwrap().text, "결제도 되나요?");

        let messages = session.conversation.messages();
        assert_eq!(messages.len(), 4);
        assert_eq!(messages[0].content, "쇼핑몰 견적");
        assert_eq!(messages[1].content, reply_text);
        assert!(!session.conversation.is_processing());
    }

    #[tokio::test]
    async fn extend_discount_sends_original_and_resets_mode() {
        let original = sample_estimate();
        let (discounted, _) = original.with_extension_discount().unwrap();
        let reply_text = format!(
            "[프로모션] 개발 기간 연장 및 할인이 적용된 견적입니다.\n{}",
            render_estimate_block(&discounted).unwrap()
        );
        let mock = ConfigurableMockBackend::with_texts(&[&reply_text]);
        let requests = mock.request_handle();
        let mut session = session(mock);
        session.estimates.replace(original);
        session.mode = PromotionMode::ExtendDiscount;

        session.submit("할인 적용").await.unwrap();

        let prompt = &requests.requests()[0].turns[0].text;
        assert!(prompt.contains("discount_extend_8w_20p"));
        assert!(prompt.contains("original_estimate:"));
        assert_eq!(session.estimates.current().unwrap().total_price, "8,400,000");
        assert_eq!(session.estimates.period_weeks(), Some(20));
        assert_eq!(session.mode, PromotionMode::Estimate);
    }

    #[tokio::test]
    async fn feature_suggestion_keeps_current_estimate() {
        let mut other = sample_estimate();
        other.project_name = "무시".to_string();
        let reply_text = format!("제안\n{}", render_estimate_block(&other).unwrap());
        let mut session = session(ConfigurableMockBackend::with_texts(&[&reply_text]));
        session.estimates.replace(sample_estimate());
        session.mode = PromotionMode::FeatureSuggestion;

        let reply = session.submit("").await.unwrap();
        assert!(reply.estimate.is_none());
        assert_eq!(
            session.estimates.current().unwrap().project_name,
            "웹 커머스 플랫폼"
        );
    }

    #[tokio::test]
    async fn transport_failure_fills_placeholder() {
        let mock = ConfigurableMockBackend::new(vec![Err(AiError::NetworkError(
            "offline".to_string(),
        )
        .into())]);
        let mut session = session(mock);

        let err = session.submit("hi").await.unwrap_err();
        assert!(err.to_string().contains("offline"));
        let messages = session.conversation.messages();
        assert_eq!(messages.len(), 2);
        assert!(messages[1].content.starts_with("Request failed:"));
        assert!(messages[1].is_error());
        assert!(!session.conversation.is_processing());
    }

    #[tokio::test]
    async fn resume_replays_persisted_turns() {
        let mock = ConfigurableMockBackend::new(vec![Ok(Generation {
            text: "계속".to_string(),
            usage: None,
        })]);
        let requests = mock.request_handle();
        let mut session = session(mock);
        session.conversation.begin_turn("이전 질문");
        session.conversation.update_last_message("이전 답변");
        session.resume();

        session.submit("다음").await.unwrap();
        let turns = &requests.requests()[0].turns;
        assert_eq!(turns.len(), 3);
        assert_eq!(turns[0], Turn::user("이전 질문"));
        assert!(turns[2].text.ends_with("\n\n사용자 입력: 다음"));
    }

    #[tokio::test]
    async fn resume_skips_failed_turns_and_resends_template() {
        let persistence: SharedPersistence = Arc::new(crate::store::MemoryPersistence::new());
        let mock = ConfigurableMockBackend::new(vec![
            Ok(Generation {
                text: "질문 있어요".to_string(),
                usage: None,
            }),
            Err(AiError::NetworkError("offline".to_string()).into()),
        ]);
        let mut first = ConsultSession::new(
            TemplateRegistry::builtin(),
            ChatTransport::new(Box::new(mock), "gemini-2.5-flash-lite"),
            ConversationStore::load(persistence.clone()),
            EstimateStore::load(persistence.clone()),
        );
        first.submit("쇼핑몰").await.unwrap();
        first.submit("결제").await.unwrap_err();

        let mock = ConfigurableMockBackend::with_texts(&["계속합니다"]);
        let requests = mock.request_handle();
        let mut resumed = ConsultSession::new(
            TemplateRegistry::builtin(),
            ChatTransport::new(Box::new(mock), "gemini-2.5-flash-lite"),
            ConversationStore::load(persistence.clone()),
            EstimateStore::load(persistence),
        );
        resumed.resume();
        resumed.submit("다음").await.unwrap();

        let turns = &requests.requests()[0].turns;
        assert_eq!(turns.len(), 3);
        assert_eq!(turns[0], Turn::user("쇼핑몰"));
        assert_eq!(turns[1], Turn::model("질문 있어요"));
        assert!(turns[2].text.contains("invoiceData"));
        assert!(turns[2].text.ends_with("\n\n사용자 입력: 다음"));
        assert!(turns.iter().all(|t| !t.text.contains("Request failed")));
    }

    #[tokio::test]
    async fn template_is_sent_until_a_turn_succeeds() {
        let mock = ConfigurableMockBackend::new(vec![
            Err(AiError::NetworkError("offline".to_string()).into()),
            Ok(Generation {
                text: "네".to_string(),
                usage: None,
            }),
        ]);
        let requests = mock.request_handle();
        let mut session = session(mock);

        session.submit("첫 질문").await.unwrap_err();
        session.submit("다시").await.unwrap();

        assert!(requests.requests()[1].turns[0].text.contains("AI 핵심 역할"));
    }

    #[test]
    fn slash_commands_parse() {
        assert!(matches!(parse_slash_command("hello"), None));
        assert!(matches!(parse_slash_command("/help"), Some(SlashCommand::Help)));
        assert!(matches!(
            parse_slash_command("/period 16"),
            Some(SlashCommand::Period(16))
        ));
        assert!(matches!(
            parse_slash_command("/mode budget-reduction"),
            Some(SlashCommand::Mode(PromotionMode::BudgetReduction))
        ));
        assert!(matches!(
            parse_slash_command("/period soon"),
            Some(SlashCommand::Unknown(_))
        ));
    }
}
