// src/connectors/messages.rs
use serde::Deserialize;

/// Common OKX v5 envelope: `{"code":"0","msg":"","data":[...]}`.
/// Every numeric field arrives as a string; empty strings are common.
#[derive(Debug, Deserialize)]
pub struct OkxEnvelope<T> {
    pub code: String,
    #[serde(default)]
    pub msg: String,
    #[serde(default = "Vec::new")]
    pub data: Vec<T>,
}

#[derive(Debug, Deserialize)]
pub struct OkxOrderAck {
    #[serde(rename = "ordId", default)]
    pub ord_id: String,
    #[serde(rename = "clOrdId", default)]
    pub cl_ord_id: String,
    #[serde(rename = "sCode", default)]
    pub s_code: String,
    #[serde(rename = "sMsg", default)]
    pub s_msg: String,
}

#[derive(Debug, Deserialize)]
pub struct OkxAccount {
    #[serde(rename = "totalEq", default)]
    pub total_eq: String,
    #[serde(default)]
    pub details: Vec<OkxBalanceDetail>,
}

#[derive(Debug, Deserialize)]
pub struct OkxBalanceDetail {
    pub ccy: String,
    #[serde(default)]
    pub eq: String,
    #[serde(rename = "availEq", default)]
    pub avail_eq: String,
    #[serde(rename = "frozenBal", default)]
    pub frozen_bal: String,
    #[serde(rename = "cashBal", default)]
    pub cash_bal: String,
}

#[derive(Debug, Deserialize)]
pub struct OkxPosition {
    #[serde(rename = "instId")]
    pub inst_id: String,
    #[serde(rename = "posSide", default)]
    pub pos_side: String,
    #[serde(default)]
    pub pos: String,
    #[serde(rename = "avgPx", default)]
    pub avg_px: String,
    #[serde(default)]
    pub upl: String,
    #[serde(rename = "uplRatio", default)]
    pub upl_ratio: String,
    #[serde(rename = "mgnRatio", default)]
    pub mgn_ratio: String,
}

/// `[ts, o, h, l, c, vol, ...]`
pub type OkxCandleRow = Vec<String>;
