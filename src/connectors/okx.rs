// src/connectors/okx.rs
use crate::config::{ApiConfig, TradingMode};
use crate::connectors::messages::{OkxAccount, OkxCandleRow, OkxEnvelope, OkxOrderAck, OkxPosition};
use crate::connectors::traits::{ExchangeGateway, ExchangeResult};
use crate::error::ExchangeError;
use crate::types::{
    Balance, Candle, MarginAction, MarginAdjustment, OrderRequest, OrderResponse, Position,
    PositionSide,
};
use crate::utils::precision::format_contracts;
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use chrono::Utc;
use hmac::{Hmac, Mac};
use reqwest::{Client, Method, StatusCode};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde_json::json;
use sha2::Sha256;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

type HmacSha256 = Hmac<Sha256>;

/// Signed REST client for the OKX v5 API. Carries no throttling of its own;
/// wrap it in `GuardedGateway` before handing it to the engine.
pub struct OkxClient {
    api_key: String,
    secret_key: String,
    passphrase: String,
    http_client: Client,
    base_rest_url: String,
    simulated: bool,
}

impl OkxClient {
    pub fn new(api: &ApiConfig, mode: TradingMode) -> ExchangeResult<Self> {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(api.timeout_secs))
            .build()?;

        let simulated = mode == TradingMode::Simulation;
        if simulated {
            info!("OKX client in simulated trading mode");
        } else {
            info!("OKX client in LIVE trading mode");
        }

        Ok(Self {
            api_key: api.key.clone(),
            secret_key: api.secret.clone(),
            passphrase: api.passphrase.clone(),
            http_client,
            base_rest_url: api.base_url.trim_end_matches('/').to_string(),
            simulated,
        })
    }

    /// Base64 HMAC-SHA256 over `timestamp + METHOD + request_path + body`.
    fn sign(&self, timestamp: &str, method: &Method, request_path: &str, body: &str) -> ExchangeResult<String> {
        let mut mac = HmacSha256::new_from_slice(self.secret_key.as_bytes())
            .map_err(|e| ExchangeError::Http(format!("invalid secret key: {}", e)))?;
        mac.update(timestamp.as_bytes());
        mac.update(method.as_str().as_bytes());
        mac.update(request_path.as_bytes());
        mac.update(body.as_bytes());
        Ok(BASE64.encode(mac.finalize().into_bytes()))
    }

    async fn send_request<T: DeserializeOwned>(
        &self,
        method: Method,
        endpoint: &str,
        query: &[(&str, String)],
        body: Option<serde_json::Value>,
    ) -> ExchangeResult<Vec<T>> {
        let request_path = if query.is_empty() {
            endpoint.to_string()
        } else {
            let query_string = serde_urlencoded::to_string(query)
                .map_err(|e| ExchangeError::Http(format!("query encoding: {}", e)))?;
            format!("{}?{}", endpoint, query_string)
        };
        let body = match body {
            Some(value) => serde_json::to_string(&value)?,
            None => String::new(),
        };

        let timestamp = Utc::now().format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string();
        let signature = self.sign(&timestamp, &method, &request_path, &body)?;
        let url = format!("{}{}", self.base_rest_url, request_path);

        let mut request = self
            .http_client
            .request(method, &url)
            .header("Content-Type", "application/json")
            .header("OK-ACCESS-KEY", &self.api_key)
            .header("OK-ACCESS-SIGN", signature)
            .header("OK-ACCESS-TIMESTAMP", timestamp)
            .header("OK-ACCESS-PASSPHRASE", &self.passphrase);
        if self.simulated {
            request = request.header("x-simulated-trading", "1");
        }
        if !body.is_empty() {
            request = request.body(body);
        }

        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;

        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(ExchangeError::RateLimited(text));
        }
        if !status.is_success() {
            return Err(ExchangeError::Http(format!("{} {}: {}", status, request_path, text)));
        }

        decode_envelope(&text)
    }
}

/// Checks the envelope code and decodes `data`. Order endpoints report the
/// real cause in the per-item `sCode`/`sMsg`, which wins when present.
pub(crate) fn decode_envelope<T: DeserializeOwned>(body: &str) -> ExchangeResult<Vec<T>> {
    let envelope: OkxEnvelope<serde_json::Value> = serde_json::from_str(body)
        .map_err(|e| ExchangeError::Decode(format!("{}: {}", e, body)))?;

    if envelope.code != "0" {
        let detail = envelope.data.first().and_then(|item| {
            let code = item.get("sCode")?.as_str()?;
            let message = item.get("sMsg").and_then(|m| m.as_str()).unwrap_or_default();
            (!code.is_empty() && code != "0").then(|| (code.to_string(), message.to_string()))
        });
        return Err(match detail {
            Some((code, message)) => ExchangeError::Api { code, message },
            None => ExchangeError::Api {
                code: envelope.code,
                message: envelope.msg,
            },
        });
    }

    envelope
        .data
        .into_iter()
        .map(|item| serde_json::from_value(item).map_err(ExchangeError::from))
        .collect()
}

/// Empty strings are how OKX says "not applicable"; treat them as zero.
fn parse_decimal(field: &str, raw: &str) -> ExchangeResult<Decimal> {
    if raw.is_empty() {
        return Ok(Decimal::ZERO);
    }
    Decimal::from_str(raw)
        .or_else(|_| Decimal::from_scientific(raw))
        .map_err(|e| ExchangeError::Decode(format!("{} = {:?}: {}", field, raw, e)))
}

fn parse_position(raw: OkxPosition) -> ExchangeResult<Option<Position>> {
    let quantity = parse_decimal("pos", &raw.pos)?;
    if quantity.is_zero() {
        return Ok(None);
    }
    let side = match raw.pos_side.as_str() {
        "long" => PositionSide::Long,
        "short" => PositionSide::Short,
        // one-way mode reports the direction through the sign
        "net" if quantity.is_sign_negative() => PositionSide::Short,
        "net" => PositionSide::Long,
        other => {
            return Err(ExchangeError::Decode(format!("unknown posSide {:?}", other)));
        }
    };

    Ok(Some(Position {
        symbol: raw.inst_id,
        side,
        quantity,
        avg_price: parse_decimal("avgPx", &raw.avg_px)?,
        unrealized_pnl: parse_decimal("upl", &raw.upl)?,
        pnl_ratio: parse_decimal("uplRatio", &raw.upl_ratio)?,
        margin_ratio: parse_decimal("mgnRatio", &raw.mgn_ratio)?,
        net_mode: raw.pos_side == "net",
    }))
}

fn parse_candle(row: OkxCandleRow) -> ExchangeResult<Option<Candle>> {
    if row.len() < 6 {
        return Ok(None);
    }
    let timestamp = row[0]
        .parse::<i64>()
        .map_err(|e| ExchangeError::Decode(format!("candle ts {:?}: {}", row[0], e)))?;

    Ok(Some(Candle {
        timestamp,
        open: parse_decimal("o", &row[1])?,
        high: parse_decimal("h", &row[2])?,
        low: parse_decimal("l", &row[3])?,
        close: parse_decimal("c", &row[4])?,
        volume: parse_decimal("vol", &row[5])?,
    }))
}

#[async_trait]
impl ExchangeGateway for OkxClient {
    async fn place_order(&self, request: &OrderRequest) -> ExchangeResult<OrderResponse> {
        let mut request = request.clone();
        if request.td_mode.is_empty() {
            request.td_mode = "isolated".to_string();
        }
        if request.cl_ord_id.is_none() {
            let nanos = Utc::now().timestamp_nanos_opt().unwrap_or_default();
            request.cl_ord_id = Some(format!("{:012}", nanos.rem_euclid(1_000_000_000_000)));
        }
        if let Ok(size) = Decimal::from_str(&request.sz) {
            request.sz = format_contracts(size);
        }

        let body = serde_json::to_value(&request)?;
        debug!("Sending order: {}", body);

        let acks: Vec<OkxOrderAck> = self
            .send_request(Method::POST, "/api/v5/trade/order", &[], Some(body))
            .await?;

        let ack = acks
            .into_iter()
            .next()
            .ok_or_else(|| ExchangeError::Decode("empty order response".to_string()))?;

        Ok(OrderResponse {
            order_id: ack.ord_id,
            client_order_id: ack.cl_ord_id,
            s_code: ack.s_code,
            s_msg: ack.s_msg,
        })
    }

    async fn cancel_order(&self, symbol: &str, order_id: &str) -> ExchangeResult<()> {
        let body = json!({ "instId": symbol, "ordId": order_id });
        let _: Vec<serde_json::Value> = self
            .send_request(Method::POST, "/api/v5/trade/cancel-order", &[], Some(body))
            .await?;
        Ok(())
    }

    async fn get_positions(&self, symbol: &str) -> ExchangeResult<Vec<Position>> {
        let rows: Vec<OkxPosition> = self
            .send_request(
                Method::GET,
                "/api/v5/account/positions",
                &[("instId", symbol.to_string())],
                None,
            )
            .await?;

        let mut positions = Vec::with_capacity(rows.len());
        for row in rows {
            if let Some(position) = parse_position(row)? {
                debug!(
                    "[{}] position {} qty={} avg={} pnl={}% margin={}%",
                    position.symbol,
                    position.side,
                    position.quantity,
                    position.avg_price,
                    position.pnl_ratio * Decimal::ONE_HUNDRED,
                    position.margin_ratio * Decimal::ONE_HUNDRED
                );
                positions.push(position);
            }
        }
        Ok(positions)
    }

    async fn get_balances(&self) -> ExchangeResult<Vec<Balance>> {
        let accounts: Vec<OkxAccount> = self
            .send_request(Method::GET, "/api/v5/account/balance", &[], None)
            .await?;

        let account = accounts
            .into_iter()
            .next()
            .ok_or_else(|| ExchangeError::Decode("empty account balance".to_string()))?;
        debug!("Account total equity: {} USD", account.total_eq);

        let mut balances = Vec::new();
        for detail in account.details {
            let equity = parse_decimal("eq", &detail.eq)?;
            if equity <= Decimal::ZERO {
                continue;
            }
            debug!(
                "Balance {}: eq={} avail={} frozen={} cash={}",
                detail.ccy, detail.eq, detail.avail_eq, detail.frozen_bal, detail.cash_bal
            );
            balances.push(Balance {
                currency: detail.ccy,
                balance: equity,
                available: parse_decimal("availEq", &detail.avail_eq)?,
                frozen: parse_decimal("frozenBal", &detail.frozen_bal)?,
            });
        }
        Ok(balances)
    }

    async fn get_klines(&self, symbol: &str, interval: &str, limit: usize) -> ExchangeResult<Vec<Candle>> {
        let rows: Vec<OkxCandleRow> = self
            .send_request(
                Method::GET,
                "/api/v5/market/candles",
                &[
                    ("instId", symbol.to_string()),
                    ("bar", interval.to_string()),
                    ("limit", limit.to_string()),
                ],
                None,
            )
            .await?;

        let mut candles = Vec::with_capacity(rows.len());
        for row in rows {
            if let Some(candle) = parse_candle(row)? {
                candles.push(candle);
            }
        }
        Ok(candles)
    }

    async fn set_leverage(
        &self,
        symbol: &str,
        leverage: u32,
        margin_mode: &str,
        pos_side: PositionSide,
    ) -> ExchangeResult<()> {
        let body = json!({
            "instId": symbol,
            "lever": leverage.to_string(),
            "mgnMode": margin_mode,
            "posSide": pos_side.as_str(),
        });
        let _: Vec<serde_json::Value> = self
            .send_request(Method::POST, "/api/v5/account/set-leverage", &[], Some(body))
            .await?;
        Ok(())
    }

    async fn add_margin(&self, adjustment: &MarginAdjustment) -> ExchangeResult<()> {
        let kind = match adjustment.action {
            MarginAction::Add => "add",
            MarginAction::Reduce => "reduce",
        };
        let body = json!({
            "instId": adjustment.inst_id,
            "posSide": adjustment.pos_side.map_or("net", |side| side.as_str()),
            "type": kind,
            "amt": adjustment.amount.round_dp(4).to_string(),
        });
        let _: Vec<serde_json::Value> = self
            .send_request(
                Method::POST,
                "/api/v5/account/position/margin-balance",
                &[],
                Some(body),
            )
            .await?;
        Ok(())
    }
}
