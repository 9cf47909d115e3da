use crate::solana::models::NATIVE_SOL_MINT;
use crate::swap::models::AssetRef;
use std::collections::HashMap;

pub const USDC_MINT: &str = "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v";
pub const USDT_MINT: &str = "Es9vMFrzaCERmJfrF4H2FYD4KCoNkY11McCe8BenwNYB";

/// Designated reserve assets. A core asset is always the quote side of a trade.
#[derive(Debug, Clone)]
pub struct CoreAssets {
    symbols: HashMap<String, Option<String>>,
}

/// Roles of the two assets of a trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairRoles<'a> {
    CoreQuote { quote: &'a str, base: &'a str },
    BothCore,
    NoCore,
}

impl CoreAssets {
    /// Build from `mint` or `mint:SYMBOL` entries.
    pub fn from_entries<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let symbols = entries
            .into_iter()
            .filter_map(|entry| {
                let entry = entry.as_ref().trim();
                if entry.is_empty() {
                    return None;
                }
                Some(match entry.split_once(':') {
                    Some((mint, symbol)) => (
                        mint.trim().to_string(),
                        Some(symbol.trim().to_string()).filter(|s| !s.is_empty()),
                    ),
                    None => (entry.to_string(), known_symbol(entry)),
                })
            })
            .collect();
        Self { symbols }
    }

    pub fn is_core(&self, mint: &str) -> bool {
        self.symbols.contains_key(mint)
    }

    pub fn asset_ref(&self, mint: &str) -> AssetRef {
        let symbol = self
            .symbols
            .get(mint)
            .cloned()
            .flatten()
            .or_else(|| known_symbol(mint));
        AssetRef::new(mint, symbol)
    }

    /// Reserve that split legs are denominated in.
    pub fn implicit_reserve(&self) -> AssetRef {
        self.asset_ref(NATIVE_SOL_MINT)
    }

    pub fn roles<'a>(&self, a: &'a str, b: &'a str) -> PairRoles<'a> {
        match (self.is_core(a), self.is_core(b)) {
            (true, true) => PairRoles::BothCore,
            (true, false) => PairRoles::CoreQuote { quote: a, base: b },
            (false, true) => PairRoles::CoreQuote { quote: b, base: a },
            (false, false) => PairRoles::NoCore,
        }
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }
}

impl Default for CoreAssets {
    fn default() -> Self {
        Self::from_entries([NATIVE_SOL_MINT, USDC_MINT, USDT_MINT])
    }
}

fn known_symbol(mint: &str) -> Option<String> {
    match mint {
        NATIVE_SOL_MINT => Some("SOL".to_string()),
        USDC_MINT => Some("USDC".to_string()),
        USDT_MINT => Some("USDT".to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn core_side_is_always_quote() {
        let core = CoreAssets::default();
        assert_eq!(
            core.roles("TokenX", USDC_MINT),
            PairRoles::CoreQuote { quote: USDC_MINT, base: "TokenX" }
        );
        assert_eq!(
            core.roles(NATIVE_SOL_MINT, "TokenX"),
            PairRoles::CoreQuote { quote: NATIVE_SOL_MINT, base: "TokenX" }
        );
    }

    #[test]
    fn both_or_neither_core() {
        let core = CoreAssets::default();
        assert_eq!(core.roles(NATIVE_SOL_MINT, USDT_MINT), PairRoles::BothCore);
        assert_eq!(core.roles("A", "B"), PairRoles::NoCore);
    }

    #[test]
    fn configured_entries_replace_defaults() {
        let core = CoreAssets::from_entries(["MintA:AAA", " ", NATIVE_SOL_MINT]);
        assert_eq!(core.len(), 2);
        assert!(!core.is_core(USDC_MINT));
        assert_eq!(core.asset_ref("MintA").symbol.as_deref(), Some("AAA"));
        assert_eq!(core.implicit_reserve().symbol.as_deref(), Some("SOL"));
    }
}
