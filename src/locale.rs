/// Language code of a locale string: the segment before the first `_`
/// separator. `"en_US"` yields `"en"`, `"en"` yields `"en"`. Only `_`
/// delimits a dialect here; `"pt-BR"` passes through whole.
pub fn language_code(locale: &str) -> &str {
    locale.split('_').next().unwrap_or(locale)
}

/// Country code of a locale string: the last separator-delimited segment,
/// uppercased. Locales without a country segment yield an empty string.
pub fn country_code(locale: &str) -> String {
    let segments: Vec<&str> = locale.split(['_', '-']).collect();
    if segments.len() < 2 {
        return String::new();
    }

    segments[segments.len() - 1].to_uppercase()
}
