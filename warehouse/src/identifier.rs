use common::config::ClassificationSettings;
use common::{Error, Result};
use std::fmt;

/// Length of a normalized taxpayer identifier.
pub const IDENTIFIER_LEN: usize = 13;

/// A taxpayer identifier left-padded with zeros to [`IDENTIFIER_LEN`] digits.
///
/// The first two digits are the issuing region and the third encodes the kind
/// of taxpayer. Source extracts frequently lose the leading zero of regions
/// `01`..`09`, which is why padding happens before decomposition.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaxpayerId(String);

impl TaxpayerId {
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();

        let reason = if trimmed.is_empty() {
            Some("empty identifier")
        } else if trimmed.len() > IDENTIFIER_LEN {
            Some("longer than 13 characters")
        } else if !trimmed.bytes().all(|b| b.is_ascii_digit()) {
            Some("non-digit characters")
        } else {
            None
        };

        if let Some(reason) = reason {
            return Err(Error::MalformedIdentifier {
                identifier: trimmed.to_string(),
                reason,
            });
        }

        Ok(Self(format!("{:0>width$}", trimmed, width = IDENTIFIER_LEN)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn region(&self) -> RegionCode {
        RegionCode(self.0[..2].to_string())
    }

    pub fn type_digit(&self) -> char {
        // ASCII digits only, so byte 2 is char 2
        self.0.as_bytes()[2] as char
    }
}

impl fmt::Display for TaxpayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Two-digit region code, compared as text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RegionCode(String);

impl RegionCode {
    /// Accepts one or two ASCII digits and zero-pads to two.
    pub fn parse(code: &str) -> Result<Self> {
        let code = code.trim();
        if code.is_empty() || code.len() > 2 || !code.bytes().all(|b| b.is_ascii_digit()) {
            return Err(Error::InvalidInput(format!(
                "region code must be one or two digits, got '{}'",
                code
            )));
        }
        Ok(Self(format!("{:0>2}", code)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RegionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaxpayerCategory {
    PublicEntity,
    PrivateEntity,
    NaturalPerson,
}

impl TaxpayerCategory {
    /// Value of `dim_tipo_ruc.tipo` this category joins against.
    pub fn label(&self) -> &'static str {
        match self {
            TaxpayerCategory::PublicEntity => "Pública",
            TaxpayerCategory::PrivateEntity => "Privada",
            TaxpayerCategory::NaturalPerson => "Natural",
        }
    }
}

/// Maps the third identifier digit onto a [`TaxpayerCategory`].
#[derive(Debug, Clone, Copy)]
pub struct ClassificationRule {
    public_digit: char,
    private_digit: char,
}

impl ClassificationRule {
    pub fn new(public_digit: char, private_digit: char) -> Result<Self> {
        if !public_digit.is_ascii_digit() || !private_digit.is_ascii_digit() {
            return Err(Error::InvalidInput(format!(
                "classification digits must be ASCII digits, got '{}' and '{}'",
                public_digit, private_digit
            )));
        }
        if public_digit == private_digit {
            return Err(Error::InvalidInput(format!(
                "public and private digits must differ, both are '{}'",
                public_digit
            )));
        }
        Ok(Self {
            public_digit,
            private_digit,
        })
    }

    pub fn from_settings(settings: &ClassificationSettings) -> Result<Self> {
        let digit = |value: &str| {
            let mut chars = value.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => Ok(c),
                _ => Err(Error::InvalidInput(format!(
                    "classification digit must be one character, got '{}'",
                    value
                ))),
            }
        };
        Self::new(digit(&settings.public_digit)?, digit(&settings.private_digit)?)
    }

    pub fn classify(&self, id: &TaxpayerId) -> TaxpayerCategory {
        match id.type_digit() {
            d if d == self.public_digit => TaxpayerCategory::PublicEntity,
            d if d == self.private_digit => TaxpayerCategory::PrivateEntity,
            _ => TaxpayerCategory::NaturalPerson,
        }
    }
}

impl Default for ClassificationRule {
    fn default() -> Self {
        Self {
            public_digit: '6',
            private_digit: '9',
        }
    }
}
