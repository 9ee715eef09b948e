//! Token identity resolution: on-chain lookup first, then a formatting pass
//! over whatever the providers extracted.

use crate::error::ProviderError;
use crate::extraction::{Field, TokenIdentity};
use crate::traits::TokenLookup;
use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::fmt;
use std::sync::OnceLock;
use std::time::Duration;
use tracing::{debug, info, warn};

const NAME_SELECTOR: &str = "0x06fdde03";
const SYMBOL_SELECTOR: &str = "0x95d89b41";
const TOTAL_SUPPLY_SELECTOR: &str = "0x18160ddd";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Chain {
    Ethereum,
    Bsc,
}

impl Chain {
    /// Lookup order for candidate addresses.
    pub const PRIORITY: [Chain; 2] = [Chain::Ethereum, Chain::Bsc];

    pub fn as_str(self) -> &'static str {
        match self {
            Chain::Ethereum => "ethereum",
            Chain::Bsc => "bsc",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Chain::Ethereum => "Ethereum",
            Chain::Bsc => "BSC",
        }
    }
}

impl fmt::Display for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OnChainToken {
    pub name: String,
    pub symbol: String,
    /// Raw `totalSupply()` in base units, as a decimal string.
    pub total_supply: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenSource {
    OnChain(Chain),
    Extracted,
    Unavailable,
}

impl TokenSource {
    pub fn as_str(self) -> &'static str {
        match self {
            TokenSource::OnChain(chain) => chain.as_str(),
            TokenSource::Extracted => "llm",
            TokenSource::Unavailable => "none",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TokenInfo {
    pub name: Field<String>,
    pub symbol: Field<String>,
    pub chains: Field<Vec<String>>,
    pub total_supply: Field<String>,
    pub source: TokenSource,
}

fn address_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\b0x[a-fA-F0-9]{40}\b").expect("valid regex"))
}

/// EVM addresses mentioned in the extracted identity, first occurrence first.
pub fn candidate_addresses(identity: &TokenIdentity) -> Vec<String> {
    let mut addresses: Vec<String> = Vec::new();
    let Some(mentions) = identity.contract_addresses.found() else {
        return addresses;
    };
    for mention in mentions {
        for found in address_pattern().find_iter(mention) {
            let address = found.as_str().to_string();
            if !addresses
                .iter()
                .any(|known| known.eq_ignore_ascii_case(&address))
            {
                addresses.push(address);
            }
        }
    }
    addresses
}

fn strip_non_word(text: &str) -> String {
    text.chars()
        .filter(|c| c.is_alphanumeric() || *c == '_')
        .collect()
}

fn capitalize_word(word: &str) -> String {
    let mut chars = word.chars();
    let Some(first) = chars.next() else {
        return String::new();
    };
    let rest: String = chars.collect();
    let all_caps = word.chars().any(char::is_alphabetic)
        && !word.chars().any(char::is_lowercase);

    let mut formatted: String = first.to_uppercase().collect();
    if all_caps {
        formatted.push_str(&rest.to_lowercase());
    } else {
        formatted.push_str(&rest);
    }
    formatted
}

/// `"Example Token!!"` becomes `"ExampleToken"`, `"TIA"` becomes `"Tia"`.
pub fn format_token_name(raw: &str) -> String {
    raw.split_whitespace()
        .map(strip_non_word)
        .map(|word| capitalize_word(&word))
        .collect()
}

/// `"$et "` becomes `"ET"`.
pub fn format_token_symbol(raw: &str) -> String {
    strip_non_word(raw).to_uppercase()
}

fn non_empty(text: String) -> Field<String> {
    if text.is_empty() {
        Field::NotFound
    } else {
        Field::Found(text)
    }
}

/// Formats name and symbol, filling a missing one from the other.
pub fn format_identity(name: &Field<String>, symbol: &Field<String>) -> (Field<String>, Field<String>) {
    match (name, symbol) {
        (Field::Failed, _) | (_, Field::Failed) => (Field::Failed, Field::Failed),
        (Field::NotFound, Field::NotFound) => (Field::NotFound, Field::NotFound),
        (Field::Found(name), Field::NotFound) => (
            non_empty(format_token_name(name)),
            non_empty(format_token_symbol(name)),
        ),
        (Field::NotFound, Field::Found(symbol)) => (
            non_empty(format_token_name(symbol)),
            non_empty(format_token_symbol(symbol)),
        ),
        (Field::Found(name), Field::Found(symbol)) => (
            non_empty(format_token_name(name)),
            non_empty(format_token_symbol(symbol)),
        ),
    }
}

pub async fn resolve_token(identity: TokenIdentity, lookup: Option<&dyn TokenLookup>) -> TokenInfo {
    if identity.token_name.is_failed() && identity.token_symbol.is_failed() {
        return TokenInfo {
            name: Field::Failed,
            symbol: Field::Failed,
            chains: identity.chains,
            total_supply: Field::Failed,
            source: TokenSource::Unavailable,
        };
    }

    if let Some(lookup) = lookup {
        for address in candidate_addresses(&identity) {
            for chain in Chain::PRIORITY {
                match lookup.lookup(&address, chain).await {
                    Ok(Some(token)) => {
                        info!(%address, %chain, "token resolved on chain");
                        return on_chain_info(token, chain, identity.chains);
                    }
                    Ok(None) => debug!(%address, %chain, "no token contract"),
                    Err(error) => warn!(%address, %chain, %error, "token lookup failed"),
                }
            }
        }
    }

    let (name, symbol) = format_identity(&identity.token_name, &identity.token_symbol);
    let source = if name.found().is_some() || symbol.found().is_some() {
        TokenSource::Extracted
    } else {
        TokenSource::Unavailable
    };

    TokenInfo {
        name,
        symbol,
        chains: identity.chains,
        total_supply: Field::NotFound,
        source,
    }
}

fn on_chain_info(token: OnChainToken, chain: Chain, extracted: Field<Vec<String>>) -> TokenInfo {
    let mut chains = match extracted {
        Field::Found(chains) => chains,
        _ => Vec::new(),
    };
    if !chains
        .iter()
        .any(|known| known.eq_ignore_ascii_case(chain.display_name()) || known.eq_ignore_ascii_case(chain.as_str()))
    {
        chains.push(chain.display_name().to_string());
    }

    TokenInfo {
        name: non_empty(token.name.trim().to_string()),
        symbol: non_empty(token.symbol.trim().to_uppercase()),
        chains: Field::Found(chains),
        total_supply: non_empty(token.total_supply),
        source: TokenSource::OnChain(chain),
    }
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    result: Option<String>,
    error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
struct RpcError {
    code: i64,
    message: String,
}

/// Reads ERC-20 metadata through `eth_call` against one JSON-RPC endpoint
/// per chain.
pub struct EvmRpcLookup {
    client: Client,
    endpoints: Vec<(Chain, String)>,
}

impl EvmRpcLookup {
    pub fn new(timeout: Duration) -> Result<Self, ProviderError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoints: Vec::new(),
        })
    }

    pub fn with_endpoint(mut self, chain: Chain, url: impl Into<String>) -> Self {
        self.endpoints.retain(|(known, _)| *known != chain);
        self.endpoints.push((chain, url.into()));
        self
    }

    pub fn has_endpoints(&self) -> bool {
        !self.endpoints.is_empty()
    }

    fn endpoint(&self, chain: Chain) -> Option<&str> {
        self.endpoints
            .iter()
            .find(|(known, _)| *known == chain)
            .map(|(_, url)| url.as_str())
    }

    /// Raw return data of a view call, `None` when the call reverted or
    /// returned nothing.
    async fn call(&self, endpoint: &str, address: &str, selector: &str) -> Result<Option<Vec<u8>>, ProviderError> {
        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "eth_call",
            "params": [{ "to": address, "data": selector }, "latest"],
        });

        let response = self.client.post(endpoint).json(&body).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::Status {
                provider: "evm-rpc".to_string(),
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }

        let reply: RpcResponse = response.json().await?;
        if let Some(error) = reply.error {
            debug!(%address, selector, code = error.code, message = %error.message, "eth_call rejected");
            return Ok(None);
        }

        Ok(reply
            .result
            .and_then(|data| hex::decode(data.strip_prefix("0x").unwrap_or(&data)).ok())
            .filter(|bytes| !bytes.is_empty()))
    }
}

#[async_trait]
impl TokenLookup for EvmRpcLookup {
    async fn lookup(&self, address: &str, chain: Chain) -> Result<Option<OnChainToken>, ProviderError> {
        let endpoint = self
            .endpoint(chain)
            .ok_or_else(|| ProviderError::Configuration(format!("no rpc endpoint for {chain}")))?;

        let Some(name) = self.call(endpoint, address, NAME_SELECTOR).await?.as_deref().and_then(decode_abi_string) else {
            return Ok(None);
        };
        let Some(symbol) = self.call(endpoint, address, SYMBOL_SELECTOR).await?.as_deref().and_then(decode_abi_string) else {
            return Ok(None);
        };
        let Some(total_supply) = self.call(endpoint, address, TOTAL_SUPPLY_SELECTOR).await?.as_deref().and_then(decode_uint256) else {
            return Ok(None);
        };

        Ok(Some(OnChainToken {
            name,
            symbol,
            total_supply,
        }))
    }
}

fn word_to_usize(word: &[u8]) -> Option<usize> {
    let (high, low) = word.split_at(24);
    if high.iter().any(|byte| *byte != 0) {
        return None;
    }
    let low: [u8; 8] = low.try_into().ok()?;
    usize::try_from(u64::from_be_bytes(low)).ok()
}

/// Decodes an ABI `string` return value. Some older tokens return a
/// zero-padded `bytes32` instead, which is accepted too.
pub fn decode_abi_string(data: &[u8]) -> Option<String> {
    let bytes = if data.len() == 32 {
        let end = data.iter().position(|byte| *byte == 0).unwrap_or(32);
        &data[..end]
    } else {
        let offset = word_to_usize(data.get(0..32)?)?;
        let length = word_to_usize(data.get(offset..offset.checked_add(32)?)?)?;
        let start = offset + 32;
        data.get(start..start.checked_add(length)?)?
    };

    let text = String::from_utf8(bytes.to_vec()).ok()?;
    let text = text.trim().to_string();
    (!text.is_empty()).then_some(text)
}

/// Decodes an ABI `uint256` into its decimal representation.
pub fn decode_uint256(data: &[u8]) -> Option<String> {
    let word = data.get(0..32)?;
    // little-endian base-10 digits
    let mut digits: Vec<u32> = vec![0];
    for &byte in word {
        let mut carry = u32::from(byte);
        for digit in digits.iter_mut() {
            let value = *digit * 256 + carry;
            *digit = value % 10;
            carry = value / 10;
        }
        while carry > 0 {
            digits.push(carry % 10);
            carry /= 10;
        }
    }
    while digits.len() > 1 && digits.last() == Some(&0) {
        digits.pop();
    }
    digits
        .iter()
        .rev()
        .map(|digit| char::from_digit(*digit, 10))
        .collect()
}
