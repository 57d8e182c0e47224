use serde::{Deserialize, Serialize};

/// Response body of `POST /company/find`. `company` is null when the IP
/// could not be attributed to a business.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompanyResponse {
    #[serde(default)]
    pub company: Option<Company>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Company {
    pub name: Option<String>,
    pub domain: Option<String>,
    pub website: Option<String>,
    pub location: Option<String>,
    pub profiles: Option<Profiles>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Profiles {
    pub linkedin: Option<Profile>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Profile {
    pub url: Option<String>,
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

impl CompanyResponse {
    pub fn name(&self) -> Option<&str> {
        self.company.as_ref().and_then(|c| non_empty(&c.name))
    }

    pub fn domain(&self) -> Option<&str> {
        self.company.as_ref().and_then(|c| non_empty(&c.domain))
    }

    pub fn website(&self) -> Option<&str> {
        self.company.as_ref().and_then(|c| non_empty(&c.website))
    }

    pub fn location(&self) -> Option<&str> {
        self.company.as_ref().and_then(|c| non_empty(&c.location))
    }

    pub fn linkedin_url(&self) -> Option<&str> {
        self.company
            .as_ref()
            .and_then(|c| c.profiles.as_ref())
            .and_then(|p| p.linkedin.as_ref())
            .and_then(|l| non_empty(&l.url))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn full_company_parses() {
        let resp: CompanyResponse = serde_json::from_value(json!({
            "fetched": true,
            "company": {
                "name": "Acme",
                "domain": "acme.com",
                "website": "https://acme.com",
                "location": "Berlin, Germany",
                "profiles": { "linkedin": { "handle": "acme", "url": "https://linkedin.com/company/acme" } }
            }
        }))
        .unwrap();

        assert_eq!(resp.name(), Some("Acme"));
        assert_eq!(resp.domain(), Some("acme.com"));
        assert_eq!(resp.website(), Some("https://acme.com"));
        assert_eq!(resp.location(), Some("Berlin, Germany"));
        assert_eq!(resp.linkedin_url(), Some("https://linkedin.com/company/acme"));
    }

    #[test]
    fn null_company_yields_nothing() {
        let resp: CompanyResponse = serde_json::from_value(json!({ "company": null })).unwrap();
        assert!(resp.company.is_none());
        assert_eq!(resp.domain(), None);
        assert_eq!(resp.linkedin_url(), None);
    }

    #[test]
    fn empty_strings_count_as_missing() {
        let resp: CompanyResponse = serde_json::from_value(json!({
            "company": { "name": "", "domain": "", "website": null, "profiles": { "linkedin": null } }
        }))
        .unwrap();
        assert_eq!(resp.name(), None);
        assert_eq!(resp.domain(), None);
        assert_eq!(resp.website(), None);
        assert_eq!(resp.linkedin_url(), None);
    }
}
