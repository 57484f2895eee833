string_enum! {
    /// A scraping source a campaign can target.
    pub enum Platform {
        Reddit => "reddit",
        LinkedIn => "linkedin",
        Website => "website",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn platform_parses_wire_names() {
        assert_eq!("reddit".parse::<Platform>().unwrap(), Platform::Reddit);
        assert_eq!("linkedin".parse::<Platform>().unwrap(), Platform::LinkedIn);
        assert_eq!("website".parse::<Platform>().unwrap(), Platform::Website);
    }

    #[test]
    fn platform_rejects_unknown_name() {
        let err = "twitter".parse::<Platform>().unwrap_err();
        assert!(err.to_string().contains("twitter"));
    }

    #[test]
    fn platform_serde_matches_as_str() {
        for platform in Platform::ALL {
            let json = serde_json::to_string(platform).unwrap();
            assert_eq!(json, format!("\"{}\"", platform.as_str()));
        }
    }
}
