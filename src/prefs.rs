use std::fmt;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::config::ThemeName;
use crate::storage::{keys, StorageHandle};

pub const KNOWN_CURRENCIES: [&str; 5] = ["EGP", "USD", "EUR", "GBP", "CAD"];

/// Currency code as chosen by the user. Unknown codes are kept verbatim and
/// printed in place of a symbol.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Currency(String);

impl Default for Currency {
    fn default() -> Self {
        Self("EGP".to_string())
    }
}

impl Currency {
    pub fn new(code: &str) -> Self {
        let code = code.trim().to_uppercase();
        if code.is_empty() {
            Self::default()
        } else {
            Self(code)
        }
    }

    pub fn code(&self) -> &str {
        &self.0
    }

    pub fn symbol(&self) -> &str {
        match self.0.as_str() {
            "USD" | "CAD" => "$",
            "EUR" => "€",
            "GBP" => "£",
            "EGP" => "ج.م",
            other => other,
        }
    }

    pub fn format(&self, amount: f64) -> String {
        let number = group_thousands(amount);
        if self.0 == "EGP" {
            format!("{} {number}", self.symbol())
        } else {
            format!("{}{number}", self.symbol())
        }
    }

    /// Next entry of the settings picker; unknown codes restart the cycle.
    pub fn cycled(&self) -> Self {
        let position = KNOWN_CURRENCIES.iter().position(|code| *code == self.0);
        let next = match position {
            Some(index) => KNOWN_CURRENCIES[(index + 1) % KNOWN_CURRENCIES.len()],
            None => KNOWN_CURRENCIES[0],
        };
        Self(next.to_string())
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Comma-grouped with at most two decimals and no trailing zeros.
pub fn group_thousands(amount: f64) -> String {
    if !amount.is_finite() {
        return "0".to_string();
    }
    let cents = (amount.abs() * 100.0).round() as u64;
    let whole = cents / 100;
    let fraction = cents % 100;

    let digits = whole.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (index, ch) in digits.chars().enumerate() {
        if index > 0 && (digits.len() - index) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    if fraction > 0 {
        let decimals = format!("{fraction:02}");
        grouped.push('.');
        grouped.push_str(decimals.trim_end_matches('0'));
    }
    if amount < 0.0 && cents > 0 {
        grouped.insert(0, '-');
    }
    grouped
}

#[derive(Debug, Clone, PartialEq)]
pub struct Preferences {
    pub currency: Currency,
    pub theme: ThemeName,
    pub notifications_enabled: bool,
}

impl Preferences {
    /// Values are stored as bare strings (`EGP`, `dark`, `true`); anything
    /// unreadable falls back to the default.
    pub fn load(storage: &StorageHandle, default_currency: &Currency) -> Result<Self> {
        let currency = storage
            .get_raw(keys::CURRENCY)?
            .map(|raw| Currency::new(unquote(&raw)))
            .unwrap_or_else(|| default_currency.clone());
        let theme = storage
            .get_raw(keys::THEME)?
            .and_then(|raw| unquote(&raw).parse::<ThemeName>().ok())
            .unwrap_or_default();
        let notifications_enabled = storage
            .get_raw(keys::NOTIFICATIONS_ENABLED)?
            .map(|raw| unquote(&raw) == "true")
            .unwrap_or(false);
        Ok(Self {
            currency,
            theme,
            notifications_enabled,
        })
    }

    pub fn set_currency(&mut self, storage: &StorageHandle, currency: Currency) -> Result<()> {
        storage.put_raw(keys::CURRENCY, currency.code())?;
        tracing::info!(currency = %currency, "currency changed");
        self.currency = currency;
        Ok(())
    }

    pub fn set_theme(&mut self, storage: &StorageHandle, theme: ThemeName) -> Result<()> {
        storage.put_raw(keys::THEME, &theme.to_string())?;
        self.theme = theme;
        Ok(())
    }

    pub fn set_notifications_enabled(
        &mut self,
        storage: &StorageHandle,
        enabled: bool,
    ) -> Result<()> {
        storage.put_raw(
            keys::NOTIFICATIONS_ENABLED,
            if enabled { "true" } else { "false" },
        )?;
        tracing::info!(enabled, "notifications preference changed");
        self.notifications_enabled = enabled;
        Ok(())
    }

    /// Key-value pairs for an atomic write alongside imported data.
    pub fn to_entries(&self) -> [(&'static str, String); 3] {
        [
            (keys::CURRENCY, self.currency.code().to_string()),
            (keys::THEME, self.theme.to_string()),
            (
                keys::NOTIFICATIONS_ENABLED,
                self.notifications_enabled.to_string(),
            ),
        ]
    }
}

fn unquote(raw: &str) -> &str {
    raw.trim().trim_matches('"')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::init_storage;

    #[test]
    fn formats_known_and_unknown_currencies() {
        assert_eq!(Currency::new("usd").format(1234.5), "$1,234.5");
        assert_eq!(Currency::new("EUR").format(1000.0), "€1,000");
        assert_eq!(Currency::new("GBP").format(0.456), "£0.46");
        assert_eq!(Currency::default().format(1360.0), "ج.م 1,360");
        assert_eq!(Currency::new("JPY").format(999.0), "JPY999");
    }

    #[test]
    fn groups_large_numbers() {
        assert_eq!(group_thousands(0.0), "0");
        assert_eq!(group_thousands(123.0), "123");
        assert_eq!(group_thousands(1234567.891), "1,234,567.89");
        assert_eq!(group_thousands(-2500.1), "-2,500.1");
    }

    #[test]
    fn cycles_through_known_currencies() {
        assert_eq!(Currency::new("EGP").cycled().code(), "USD");
        assert_eq!(Currency::new("CAD").cycled().code(), "EGP");
        assert_eq!(Currency::new("XYZ").cycled().code(), "EGP");
    }

    #[test]
    fn load_defaults_then_persisted_values() -> anyhow::Result<()> {
        let (_temp, storage) = init_storage()?;
        let mut prefs = Preferences::load(&storage, &Currency::default())?;
        assert_eq!(prefs.currency.code(), "EGP");
        assert_eq!(prefs.theme, ThemeName::Light);
        assert!(!prefs.notifications_enabled);

        prefs.set_currency(&storage, Currency::new("GBP"))?;
        prefs.set_theme(&storage, ThemeName::Dark)?;
        prefs.set_notifications_enabled(&storage, true)?;

        let reloaded = Preferences::load(&storage, &Currency::default())?;
        assert_eq!(reloaded, prefs);
        Ok(())
    }

    #[test]
    fn tolerates_json_quoted_values() -> anyhow::Result<()> {
        let (_temp, storage) = init_storage()?;
        storage.put_raw(keys::THEME, "\"dark\"")?;
        storage.put_raw(keys::CURRENCY, "\"usd\"")?;
        storage.put_raw(keys::NOTIFICATIONS_ENABLED, "\"true\"")?;
        let prefs = Preferences::load(&storage, &Currency::default())?;
        assert_eq!(prefs.theme, ThemeName::Dark);
        assert_eq!(prefs.currency.code(), "USD");
        assert!(prefs.notifications_enabled);
        Ok(())
    }
}
