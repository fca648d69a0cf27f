/// GitLab Webhookスモークテスト
///
/// サンプルのGitLabイベントを送信し、応答ステータスを確認する。
///
/// # 実行例
/// ```bash
/// # デプロイ済みAPI Gateway（またはローカルゲートウェイ）に送信
/// cargo run --bin send_test_event -- gateway \
///     --url https://xxxx.execute-api.us-east-1.amazonaws.com/prod/events \
///     --api-key $API_KEY
///
/// # Lambda RIE（docker run -p 9000:8080 ...）にGETを送って405を確認
/// cargo run --bin send_test_event -- rie --method GET --expect-status 405
///
/// # 任意のペイロードファイルを送信
/// cargo run --bin send_test_event -- gateway --url http://localhost:8080/events \
///     --api-key local-key --event-file ./push_event.json --event "Push Hook"
/// ```
use clap::{Parser, Subcommand};
use tracing::{error, info};
use webhook::domain::{GitlabEventKind, SAMPLE_ISSUE_EVENT};
use webhook::infrastructure::event_sender::DEFAULT_RIE_URL;
use webhook::infrastructure::{EventSender, SendOutcome, init_logging};

/// コマンドライン引数
#[derive(Parser, Debug)]
#[command(name = "send_test_event")]
#[command(about = "サンプルのGitLabイベントをWebhookエンドポイントに送信")]
struct CliArgs {
    /// 送信するペイロードのJSONファイル（省略時は組み込みのissueイベント）
    #[arg(long, global = true)]
    event_file: Option<String>,

    /// X-Gitlab-Eventヘッダーの値
    #[arg(long, global = true, default_value = "Issue Hook")]
    event: String,

    /// 期待するステータスコード（省略時は2xxを成功とみなす）
    #[arg(long, global = true)]
    expect_status: Option<u16>,

    #[command(subcommand)]
    target: Target,
}

/// 送信先
#[derive(Subcommand, Debug)]
enum Target {
    /// API Gateway / ローカルゲートウェイの /events に送信
    Gateway {
        /// /events エンドポイントのURL
        #[arg(long)]
        url: String,

        /// x-api-keyヘッダーの値（環境変数API_KEYでも指定可）
        #[arg(long, env = "API_KEY")]
        api_key: Option<String>,
    },
    /// Lambda RIEにAPI Gatewayプロキシイベントとして送信
    Rie {
        /// RIEの invocations URL
        #[arg(long, default_value = DEFAULT_RIE_URL)]
        url: String,

        /// プロキシイベントのhttpMethod
        #[arg(long, default_value = "POST")]
        method: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    init_logging();

    let args = CliArgs::parse();

    let payload = match &args.event_file {
        Some(path) => std::fs::read_to_string(path)?,
        None => SAMPLE_ISSUE_EVENT.to_string(),
    };
    let kind = GitlabEventKind::from_header(&args.event);

    let sender = EventSender::new()?;

    let outcome = match &args.target {
        Target::Gateway { url, api_key } => {
            sender
                .send_to_gateway(url, api_key.as_deref(), &kind, &payload)
                .await?
        }
        Target::Rie { url, method } => sender.invoke_rie(url, method, &kind, &payload).await?,
    };

    println!("status: {}", outcome.status);
    println!("body: {}", outcome.body);

    if is_expected(&outcome, args.expect_status) {
        info!(status = outcome.status, "スモークテスト成功");
        Ok(())
    } else {
        error!(status = outcome.status, expected = ?args.expect_status, "スモークテスト失敗");
        Err(format!("想定外のステータス: {}", outcome.status).into())
    }
}

/// 結果が期待通りかを判定する
fn is_expected(outcome: &SendOutcome, expect_status: Option<u16>) -> bool {
    match expect_status {
        Some(status) => outcome.status == status,
        None => outcome.is_success(),
    }
}
