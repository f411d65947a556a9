use serde::{Deserialize, Serialize};

/// A postal contact: the receiver block of a shipment, or an order's shipping address.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ContactAddress {
    pub name: String,
    #[serde(default)]
    pub company: Option<String>,
    pub line1: String,
    #[serde(default)]
    pub line2: Option<String>,
    #[serde(default)]
    pub line3: Option<String>,
    pub city: String,
    #[serde(default)]
    pub state: Option<String>,
    pub pincode: String,
    /// ISO 3166-1 alpha-2
    pub country: String,
    pub phone: String,
    #[serde(default)]
    pub email: Option<String>,
}

impl ContactAddress {
    pub fn is_domestic(&self, home_country: &str) -> bool {
        self.country.eq_ignore_ascii_case(home_country)
    }

    /// Address lines in order, skipping blanks.
    pub fn lines(&self) -> Vec<&str> {
        [Some(self.line1.as_str()), self.line2.as_deref(), self.line3.as_deref()]
            .into_iter()
            .flatten()
            .filter(|l| !l.trim().is_empty())
            .collect()
    }
}

/// Fixed warehouse identity every shipment is sent from.
///
/// Loaded from configuration and handed to adapters only; it is deliberately
/// not `Serialize` so it cannot end up in a client-facing response.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct SenderProfile {
    pub contact_name: String,
    pub company: String,
    pub line1: String,
    #[serde(default)]
    pub line2: Option<String>,
    #[serde(default)]
    pub line3: Option<String>,
    pub city: String,
    #[serde(default)]
    pub state: Option<String>,
    pub pincode: String,
    pub country: String,
    pub phone: String,
    #[serde(default)]
    pub mobile: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    /// Carrier-assigned origin area code.
    pub area_code: String,
    /// Carrier-assigned customer/account code.
    pub customer_code: String,
}

impl SenderProfile {
    pub fn lines(&self) -> Vec<&str> {
        [Some(self.line1.as_str()), self.line2.as_deref(), self.line3.as_deref()]
            .into_iter()
            .flatten()
            .filter(|l| !l.trim().is_empty())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lines_skip_blanks() {
        let address = ContactAddress {
            line1: "12 MG Road".to_string(),
            line2: Some("  ".to_string()),
            line3: Some("Indiranagar".to_string()),
            country: "IN".to_string(),
            ..Default::default()
        };

        assert_eq!(address.lines(), vec!["12 MG Road", "Indiranagar"]);
        assert!(address.is_domestic("in"));
    }
}
