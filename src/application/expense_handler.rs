/// 支出Webhookハンドラー
///
/// 受信メッセージ1件を処理し、返信を送信する。
/// コマンド判定 → パース → (抽出) → 正規化 → 保存 → 返信 の順に実行する。
/// どの段階のエラーもユーザー向けの返信に変換し、呼び出し元には伝播しない。
use tracing::{Instrument, debug, info, info_span, warn};

use crate::application::{ExtractionError, FieldExtractor, IncomingMessage};
use crate::domain::{
    BotCommand, CommandError, CommandParser, ExpenseCommand, ExpenseDraft, ExpenseNormalizer,
    ExtractedExpense, NormalizedExpense, ParsedAmountDescription, PersistenceMode,
    ProcessingOptions, ReplyMessage,
};
use crate::infrastructure::{
    CompletionClient, NotificationSender, PersistenceError, SheetAppender,
};

/// 1リクエストの処理結果
#[derive(Debug, Clone, PartialEq)]
pub struct HandlerOutcome {
    /// 送信した（または送信を試みた）返信
    pub reply: ReplyMessage,
    /// スプレッドシートに追記したか
    pub persisted: bool,
    /// 返信の送信に成功したか
    pub delivered: bool,
}

/// パース段階の結果
enum ParseStage {
    /// パース成功
    Parsed(ParsedAmountDescription),
    /// strictモードで金額が不正（抽出で補完できる可能性がある）
    InvalidAmount(String),
}

/// 支出Webhookハンドラー
///
/// 外部サービスはいずれも任意で、未設定の場合はそのサービスなしで動作する。
pub struct ExpenseHandler<SA, NS, CC>
where
    SA: SheetAppender,
    NS: NotificationSender,
    CC: CompletionClient,
{
    appender: Option<SA>,
    notifier: Option<NS>,
    extractor: Option<FieldExtractor<CC>>,
    parser: CommandParser,
    options: ProcessingOptions,
}

impl<SA, NS, CC> ExpenseHandler<SA, NS, CC>
where
    SA: SheetAppender,
    NS: NotificationSender,
    CC: CompletionClient,
{
    /// 新しいExpenseHandlerを作成
    ///
    /// `options.use_extraction`がfalseの場合、補完クライアントは使わない。
    pub fn new(
        appender: Option<SA>,
        notifier: Option<NS>,
        completion_client: Option<CC>,
        options: ProcessingOptions,
    ) -> Self {
        let extractor = completion_client
            .filter(|_| options.use_extraction)
            .map(FieldExtractor::new);

        Self {
            appender,
            notifier,
            extractor,
            parser: CommandParser::new(options.parse_mode),
            options,
        }
    }

    pub fn options(&self) -> &ProcessingOptions {
        &self.options
    }

    /// 受信メッセージを処理
    ///
    /// # 処理フロー
    /// 1. コマンド種別を判定（/start, /help, 未知のコマンドは定型返信）
    /// 2. 支出コマンドを処理して返信を決定
    /// 3. 返信を送信（失敗はログのみ）
    pub async fn handle(&self, message: &IncomingMessage) -> HandlerOutcome {
        let command = BotCommand::classify(&message.text);
        let span = info_span!(
            "webhook",
            sender_id = %message.sender_id,
            command = command.as_str(),
            update_id = message.update_id,
        );

        async move {
            let (reply, persisted) = match command {
                BotCommand::Start => (ReplyMessage::Welcome, false),
                BotCommand::Help => (ReplyMessage::Help, false),
                BotCommand::Unknown => (ReplyMessage::UnknownCommand, false),
                BotCommand::Expense => self.process_expense(message).await,
            };

            let delivered = self.deliver(message, &reply).await;

            info!(
                outcome = reply.kind(),
                persisted,
                delivered,
                "Webhook処理完了"
            );

            HandlerOutcome {
                reply,
                persisted,
                delivered,
            }
        }
        .instrument(span)
        .await
    }

    /// 支出コマンドを処理し、(返信, 保存したか) を返す
    async fn process_expense(&self, message: &IncomingMessage) -> (ReplyMessage, bool) {
        let command = ExpenseCommand::new(message.text.clone(), message.sender_id.clone());

        let stage = match self.parser.parse(&command.raw_text) {
            Ok(parsed) => ParseStage::Parsed(parsed),
            Err(CommandError::Format) => {
                debug!("トークン不足");
                return (ReplyMessage::FormatError, false);
            }
            Err(CommandError::InvalidAmount { token, source }) => {
                debug!(token = %token, error = %source, "金額が不正（strict）");
                ParseStage::InvalidAmount(token)
            }
        };

        let (extracted, extraction_failed) = match self.try_extract(&command).await {
            Some(Ok(extracted)) => (Some(extracted), false),
            Some(Err(e)) => {
                warn!(error = %e, "抽出サービス利用不可、コマンド解析にフォールバック");
                (None, true)
            }
            None => (None, false),
        };

        let draft = match (extracted, stage) {
            (Some(extracted), _) => ExpenseDraft::Extracted(extracted),
            (None, ParseStage::Parsed(parsed)) => ExpenseDraft::Parsed(parsed),
            (None, ParseStage::InvalidAmount(token)) => {
                return (
                    ReplyMessage::InvalidAmount {
                        token,
                        extraction_failed,
                    },
                    false,
                );
            }
        };

        let source = draft.source();
        let token = match &draft {
            ExpenseDraft::Parsed(parsed) => parsed.amount_token.clone(),
            ExpenseDraft::Extracted(extracted) => extracted.amount.to_string(),
        };

        let expense = match ExpenseNormalizer::normalize(draft, command.sender_id) {
            Ok(expense) => expense,
            Err(e) => {
                info!(error = %e, source, "正規化エラー");
                return (
                    ReplyMessage::InvalidAmount {
                        token,
                        extraction_failed,
                    },
                    false,
                );
            }
        };

        debug!(
            source,
            amount = expense.amount.value(),
            category = %expense.category,
            "正規化完了"
        );

        match self.options.persistence_mode {
            PersistenceMode::Simulation => {
                info!("シミュレーションモードのため保存をスキップ");
                (
                    ReplyMessage::Recorded {
                        expense,
                        simulated: true,
                    },
                    false,
                )
            }
            PersistenceMode::Live => match self.persist(&expense).await {
                Ok(()) => (
                    ReplyMessage::Recorded {
                        expense,
                        simulated: false,
                    },
                    true,
                ),
                Err(e) => {
                    warn!(error = %e, "保存失敗");
                    (ReplyMessage::PersistenceFailed, false)
                }
            },
        }
    }

    /// 抽出を試みる（抽出器がない場合はNone）
    async fn try_extract(
        &self,
        command: &ExpenseCommand,
    ) -> Option<Result<ExtractedExpense, ExtractionError>> {
        let extractor = self.extractor.as_ref()?;
        Some(extractor.extract(&command.arguments()).await)
    }

    async fn persist(&self, expense: &NormalizedExpense) -> Result<(), PersistenceError> {
        match &self.appender {
            Some(appender) => appender.append(expense).await,
            None => Err(PersistenceError::NotConfigured),
        }
    }

    /// 返信を送信し、成功したかを返す
    async fn deliver(&self, message: &IncomingMessage, reply: &ReplyMessage) -> bool {
        let Some(notifier) = &self.notifier else {
            warn!("返信送信先が未設定のため返信をスキップ");
            return false;
        };

        let style = self.options.reply_style;
        match notifier
            .send(&message.sender_id, &reply.render(style), style)
            .await
        {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "返信送信失敗");
                false
            }
        }
    }
}
