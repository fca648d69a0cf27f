// Webhookリクエストモデル
//
// Lambda（API Gatewayプロキシ統合）とローカルゲートウェイの双方から
// 同じ形で扱えるよう、トランスポートに依存しないHTTPリクエストを表現する。

/// トランスポート非依存のWebhookリクエスト
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WebhookRequest {
    /// HTTPメソッド（API Gatewayは大文字で渡す）
    pub method: String,
    /// リクエストパス
    pub path: String,
    /// ヘッダー（名前は小文字に正規化して保持）
    headers: Vec<(String, String)>,
    /// リクエストボディ（空の場合はNone）
    pub body: Option<String>,
}

impl WebhookRequest {
    /// 新しいリクエストを作成
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
            headers: Vec::new(),
            body: None,
        }
    }

    /// ヘッダーを追加（同名ヘッダーは後勝ちで上書き）
    pub fn with_header(mut self, name: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.insert_header(name, value);
        self
    }

    /// ボディを設定
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// ヘッダーを挿入
    pub fn insert_header(&mut self, name: impl AsRef<str>, value: impl Into<String>) {
        let name = name.as_ref().to_ascii_lowercase();
        let value = value.into();
        match self.headers.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = value,
            None => self.headers.push((name, value)),
        }
    }

    /// ヘッダー値を大文字小文字を区別せずに取得
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// 全ヘッダーを取得
    #[cfg(test)]
    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// POSTリクエストかどうか
    ///
    /// API Gatewayはメソッドを大文字で渡すため、比較は大文字小文字を区別する。
    pub fn is_post(&self) -> bool {
        self.method == "POST"
    }

    /// ボディの長さ（バイト）
    pub fn body_len(&self) -> usize {
        self.body.as_deref().map(str::len).unwrap_or(0)
    }
}
