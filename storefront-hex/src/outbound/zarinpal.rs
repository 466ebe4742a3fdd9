//! Zarinpal v4 REST gateway client.

use std::str::FromStr;
use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};

use storefront_types::{
    GatewayAuthorization, GatewayError, GatewayVerification, PaymentGateway, PaymentIntent,
};

const PRODUCTION_BASE: &str = "https://payment.zarinpal.com/pg";
const SANDBOX_BASE: &str = "https://sandbox.zarinpal.com/pg";

/// Gateway codes that mean the call succeeded.
const CODE_SUCCESS: i64 = 100;
const CODE_ALREADY_VERIFIED: i64 = 101;

/// Unit the gateway is asked to charge in. Orders are always priced in Toman.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GatewayCurrency {
    /// Toman, sent as-is
    #[default]
    Irt,
    /// Rial, ten per Toman
    Irr,
}

impl GatewayCurrency {
    fn code(&self) -> &'static str {
        match self {
            GatewayCurrency::Irt => "IRT",
            GatewayCurrency::Irr => "IRR",
        }
    }

    /// Converts a Toman amount into the gateway unit.
    pub fn from_toman(&self, amount: i64) -> i64 {
        match self {
            GatewayCurrency::Irt => amount,
            GatewayCurrency::Irr => amount.saturating_mul(10),
        }
    }
}

impl FromStr for GatewayCurrency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "IRT" => Ok(GatewayCurrency::Irt),
            "IRR" => Ok(GatewayCurrency::Irr),
            other => Err(format!("Unsupported gateway currency: {}", other)),
        }
    }
}

/// Settings for [`ZarinpalGateway`].
#[derive(Debug, Clone)]
pub struct ZarinpalConfig {
    pub merchant_id: String,
    pub sandbox: bool,
    pub currency: GatewayCurrency,
    /// Where the gateway sends the shopper back; `orderId` is appended.
    pub callback_url: String,
    pub timeout: Duration,
}

/// Zarinpal payment gateway adapter.
pub struct ZarinpalGateway {
    config: ZarinpalConfig,
    base_url: String,
    http: Client,
}

impl ZarinpalGateway {
    /// Creates a client whose every call is bounded by `config.timeout`.
    pub fn new(config: ZarinpalConfig) -> Result<Self, GatewayError> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| GatewayError::Transport(e.to_string()))?;
        let base_url = if config.sandbox {
            SANDBOX_BASE
        } else {
            PRODUCTION_BASE
        };

        Ok(Self {
            config,
            base_url: base_url.to_string(),
            http,
        })
    }

    /// Points the client at another host (a local stub in tests).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Page the shopper is redirected to for `authority`.
    pub fn start_pay_url(&self, authority: &str) -> String {
        format!("{}/StartPay/{}", self.base_url, authority)
    }

    fn callback_url_for(&self, order_id: &str) -> String {
        let separator = if self.config.callback_url.contains('?') {
            '&'
        } else {
            '?'
        };
        format!("{}{}orderId={}", self.config.callback_url, separator, order_id)
    }

    async fn post<T: DeserializeOwned>(&self, path: &str, body: Value) -> Result<T, GatewayError> {
        let resp = self
            .http
            .post(format!("{}/v4/payment/{}", self.base_url, path))
            .header("Accept", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?;

        // Rejections come back as 4xx with a JSON body, so the status alone
        // says nothing.
        let status = resp.status();
        let body: Value = resp.json().await.map_err(|e| {
            if e.is_timeout() {
                GatewayError::Timeout
            } else {
                GatewayError::InvalidResponse(format!("HTTP {}: {}", status, e))
            }
        })?;

        parse_envelope(body)
    }
}

fn transport_error(err: reqwest::Error) -> GatewayError {
    if err.is_timeout() {
        GatewayError::Timeout
    } else {
        GatewayError::Transport(err.to_string())
    }
}

/// Unwraps `{"data": .., "errors": ..}`. The gateway sends an empty array for
/// whichever side is unused.
fn parse_envelope<T: DeserializeOwned>(body: Value) -> Result<T, GatewayError> {
    if let Some(errors) = body.get("errors").filter(|e| e.is_object()) {
        return Err(GatewayError::Rejected {
            code: errors.get("code").and_then(Value::as_i64).unwrap_or_default(),
            message: errors
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("unknown error")
                .to_string(),
        });
    }

    let data = body
        .get("data")
        .filter(|d| d.is_object())
        .cloned()
        .ok_or_else(|| GatewayError::InvalidResponse("missing data".into()))?;
    serde_json::from_value(data).map_err(|e| GatewayError::InvalidResponse(e.to_string()))
}

#[derive(Deserialize)]
struct RequestData {
    code: i64,
    #[serde(default)]
    message: String,
    authority: String,
}

#[derive(Deserialize)]
struct VerifyData {
    code: i64,
    #[serde(default)]
    message: String,
    ref_id: Value,
    card_pan: Option<String>,
    fee: Option<i64>,
}

fn ref_id_text(value: &Value) -> Option<String> {
    match value {
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        _ => None,
    }
}

#[async_trait::async_trait]
impl PaymentGateway for ZarinpalGateway {
    fn name(&self) -> &'static str {
        "zarinpal"
    }

    #[tracing::instrument(skip(self, intent), fields(order_id = %intent.order_id))]
    async fn request_payment(
        &self,
        intent: PaymentIntent,
    ) -> Result<GatewayAuthorization, GatewayError> {
        let order_id = intent.order_id.to_string();
        let body = json!({
            "merchant_id": self.config.merchant_id,
            "amount": self.config.currency.from_toman(intent.amount),
            "currency": self.config.currency.code(),
            "callback_url": self.callback_url_for(&order_id),
            "description": intent.description,
            "metadata": { "order_id": order_id },
        });

        let data: RequestData = self.post("request.json", body).await?;
        if data.code != CODE_SUCCESS {
            return Err(GatewayError::Rejected {
                code: data.code,
                message: data.message,
            });
        }

        tracing::debug!(authority = %data.authority, "Gateway issued authority");
        Ok(GatewayAuthorization {
            payment_url: self.start_pay_url(&data.authority),
            authority: data.authority,
        })
    }

    #[tracing::instrument(skip(self))]
    async fn verify_payment(
        &self,
        authority: &str,
        amount: i64,
    ) -> Result<GatewayVerification, GatewayError> {
        let body = json!({
            "merchant_id": self.config.merchant_id,
            "amount": self.config.currency.from_toman(amount),
            "authority": authority,
        });

        let data: VerifyData = self.post("verify.json", body).await?;
        if data.code != CODE_SUCCESS && data.code != CODE_ALREADY_VERIFIED {
            return Err(GatewayError::Rejected {
                code: data.code,
                message: data.message,
            });
        }

        let ref_id = ref_id_text(&data.ref_id)
            .ok_or_else(|| GatewayError::InvalidResponse("missing ref_id".into()))?;
        Ok(GatewayVerification {
            ref_id,
            card_pan: data.card_pan,
            fee: data.fee,
            already_verified: data.code == CODE_ALREADY_VERIFIED,
        })
    }
}

#[cfg(test)]
mod tests {
    use axum::{Json, Router, routing::post};
    use storefront_types::OrderId;

    use super::*;

    fn config(currency: GatewayCurrency) -> ZarinpalConfig {
        ZarinpalConfig {
            merchant_id: "00000000-0000-0000-0000-000000000000".into(),
            sandbox: true,
            currency,
            callback_url: "https://shop.example/api/payment/callback".into(),
            timeout: Duration::from_secs(2),
        }
    }

    /// Serves `request` and `verify` answers from a local listener.
    async fn stub_gateway(request: Value, verify: Value) -> String {
        let app = Router::new()
            .route(
                "/pg/v4/payment/request.json",
                post(move || {
                    let body = request.clone();
                    async move { Json(body) }
                }),
            )
            .route(
                "/pg/v4/payment/verify.json",
                post(move || {
                    let body = verify.clone();
                    async move { Json(body) }
                }),
            );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}/pg", addr)
    }

    #[test]
    fn test_currency_conversion() {
        assert_eq!(GatewayCurrency::Irt.from_toman(1500), 1500);
        assert_eq!(GatewayCurrency::Irr.from_toman(1500), 15000);
        assert_eq!("irr".parse::<GatewayCurrency>(), Ok(GatewayCurrency::Irr));
        assert!("usd".parse::<GatewayCurrency>().is_err());
    }

    #[test]
    fn test_sandbox_urls() {
        let gateway = ZarinpalGateway::new(config(GatewayCurrency::Irt)).unwrap();

        assert_eq!(
            gateway.start_pay_url("A123"),
            "https://sandbox.zarinpal.com/pg/StartPay/A123"
        );
        assert_eq!(
            gateway.callback_url_for("42"),
            "https://shop.example/api/payment/callback?orderId=42"
        );
    }

    #[test]
    fn test_callback_url_keeps_existing_query() {
        let mut cfg = config(GatewayCurrency::Irt);
        cfg.callback_url = "https://shop.example/cb?lang=fa".into();
        let gateway = ZarinpalGateway::new(cfg).unwrap();

        assert_eq!(
            gateway.callback_url_for("42"),
            "https://shop.example/cb?lang=fa&orderId=42"
        );
    }

    #[test]
    fn test_envelope_error_is_rejection() {
        let body = json!({
            "data": [],
            "errors": { "code": -9, "message": "The input params invalid, validation error." }
        });

        let result: Result<RequestData, _> = parse_envelope(body);

        assert!(matches!(result, Err(GatewayError::Rejected { code: -9, .. })));
    }

    #[test]
    fn test_envelope_without_data_is_invalid() {
        let result: Result<RequestData, _> = parse_envelope(json!({ "data": [], "errors": [] }));

        assert!(matches!(result, Err(GatewayError::InvalidResponse(_))));
    }

    #[tokio::test]
    async fn test_request_and_verify_against_stub() {
        let base = stub_gateway(
            json!({
                "data": { "code": 100, "message": "Success", "authority": "A0000000000000000000000000000wwOGYpd", "fee_type": "Merchant", "fee": 100 },
                "errors": []
            }),
            json!({
                "data": { "code": 100, "message": "Verified", "card_pan": "502229******5995", "ref_id": 201, "fee_type": "Merchant", "fee": 0 },
                "errors": []
            }),
        )
        .await;
        let gateway = ZarinpalGateway::new(config(GatewayCurrency::Irt))
            .unwrap()
            .with_base_url(&base);

        let auth = gateway
            .request_payment(PaymentIntent {
                order_id: OrderId::new(),
                amount: 1000,
                description: "Order".into(),
            })
            .await
            .unwrap();
        assert_eq!(auth.authority, "A0000000000000000000000000000wwOGYpd");
        assert_eq!(
            auth.payment_url,
            format!("{}/StartPay/A0000000000000000000000000000wwOGYpd", base)
        );

        let verification = gateway.verify_payment(&auth.authority, 1000).await.unwrap();
        assert_eq!(verification.ref_id, "201");
        assert_eq!(verification.card_pan.as_deref(), Some("502229******5995"));
        assert!(!verification.already_verified);
    }

    #[tokio::test]
    async fn test_already_verified_counts_as_success() {
        let base = stub_gateway(
            json!({ "data": [], "errors": [] }),
            json!({
                "data": { "code": 101, "message": "Verified", "card_pan": null, "ref_id": "201", "fee": null },
                "errors": []
            }),
        )
        .await;
        let gateway = ZarinpalGateway::new(config(GatewayCurrency::Irt))
            .unwrap()
            .with_base_url(&base);

        let verification = gateway.verify_payment("A1", 1000).await.unwrap();

        assert!(verification.already_verified);
        assert_eq!(verification.ref_id, "201");
    }

    #[tokio::test]
    async fn test_verify_rejection() {
        let base = stub_gateway(
            json!({ "data": [], "errors": [] }),
            json!({ "data": [], "errors": { "code": -51, "message": "Session is not valid, session is not active paid try." } }),
        )
        .await;
        let gateway = ZarinpalGateway::new(config(GatewayCurrency::Irt))
            .unwrap()
            .with_base_url(&base);

        let result = gateway.verify_payment("A1", 1000).await;

        assert!(matches!(result, Err(GatewayError::Rejected { code: -51, .. })));
    }

    #[tokio::test]
    async fn test_unreachable_gateway_is_transport_error() {
        let gateway = ZarinpalGateway::new(config(GatewayCurrency::Irt))
            .unwrap()
            .with_base_url("http://127.0.0.1:9/pg");

        let result = gateway.verify_payment("A1", 1000).await;

        assert!(matches!(
            result,
            Err(GatewayError::Transport(_) | GatewayError::Timeout)
        ));
    }
}
