use serde::Deserialize;

const TOKENINFO_URL: &str = "https://oauth2.googleapis.com/tokeninfo";

#[derive(Debug, Deserialize)]
struct TokenInfo {
    aud: Option<String>,
    email: Option<String>,
    name: Option<String>,
    given_name: Option<String>,
    family_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GoogleProfile {
    pub email: String,
    pub name: String,
}

impl TokenInfo {
    fn into_profile(self, client_id: &str) -> Option<GoogleProfile> {
        if client_id.is_empty() || self.aud.as_deref() != Some(client_id) {
            return None;
        }
        let email = self.email?.trim().to_lowercase();
        if email.is_empty() {
            return None;
        }

        let full_name = format!(
            "{} {}",
            self.given_name.unwrap_or_default(),
            self.family_name.unwrap_or_default()
        );
        let name = self
            .name
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())
            .or_else(|| Some(full_name.trim().to_string()).filter(|n| !n.is_empty()))
            .unwrap_or_else(|| email.clone());

        Some(GoogleProfile { email, name })
    }
}

/// Checks a Google ID token against the tokeninfo endpoint.
pub async fn verify_google_token(
    http: &reqwest::Client,
    client_id: &str,
    id_token: &str,
) -> Option<GoogleProfile> {
    let resp = match http
        .get(TOKENINFO_URL)
        .query(&[("id_token", id_token)])
        .send()
        .await
    {
        Ok(resp) => resp,
        Err(e) => {
            tracing::warn!("Google tokeninfo request failed: {}", e);
            return None;
        }
    };

    if !resp.status().is_success() {
        tracing::debug!("Google rejected id token: {}", resp.status());
        return None;
    }

    match resp.json::<TokenInfo>().await {
        Ok(info) => info.into_profile(client_id),
        Err(e) => {
            tracing::warn!("Unreadable tokeninfo response: {}", e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(json: &str) -> TokenInfo {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn audience_must_match() {
        let t = info(r#"{"aud":"other-client","email":"A@Gmail.com"}"#);
        assert!(t.into_profile("my-client").is_none());

        let t = info(r#"{"aud":"my-client","email":"A@Gmail.com","name":"Amine"}"#);
        assert_eq!(
            t.into_profile("my-client"),
            Some(GoogleProfile {
                email: "a@gmail.com".into(),
                name: "Amine".into()
            })
        );
    }

    #[test]
    fn name_falls_back_to_parts_then_email() {
        let t = info(r#"{"aud":"c","email":"x@y.dz","given_name":"Sara","family_name":"B"}"#);
        assert_eq!(t.into_profile("c").unwrap().name, "Sara B");

        let t = info(r#"{"aud":"c","email":"x@y.dz"}"#);
        assert_eq!(t.into_profile("c").unwrap().name, "x@y.dz");
    }

    #[test]
    fn missing_email_or_client_is_rejected() {
        assert!(info(r#"{"aud":"c"}"#).into_profile("c").is_none());
        assert!(info(r#"{"aud":"","email":"x@y.dz"}"#).into_profile("").is_none());
    }
}
