use crate::schema::Row;
use log::warn;
use unicode_normalization::UnicodeNormalization;

/// Maps a spreadsheet header to its canonical slug.
///
/// Lowercases, strips diacritics, replaces anything outside `[a-z0-9]` with `_`,
/// then collapses and trims underscores. Symbol-only input yields an empty string.
///
/// # Examples
/// - `"Preço_Unitário"` → `"preco_unitario"`
/// - `"  Receita Total (R$) "` → `"receita_total_r"`
pub fn normalize_header(header: &str) -> String {
    let mut slug = String::with_capacity(header.len());

    for c in header.to_lowercase().nfd().filter(|c| !is_diacritic(*c)) {
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            slug.push(c);
        } else if !slug.is_empty() && !slug.ends_with('_') {
            slug.push('_');
        }
    }

    while slug.ends_with('_') {
        slug.pop();
    }

    slug
}

/// Combining Diacritical Marks block (U+0300..=U+036F). Marks outside it, such as
/// Devanagari vowel signs, are treated like any other separator.
fn is_diacritic(c: char) -> bool {
    ('\u{0300}'..='\u{036f}').contains(&c)
}

/// Re-keys a raw row by normalized header, keeping column order.
///
/// Headers that collide on the same slug overwrite each other: the last value
/// wins and the column keeps the position of its first occurrence.
pub fn normalize_row(raw: &Row) -> Row {
    let mut normalized = Row::with_capacity(raw.len());

    for (header, value) in raw {
        let slug = normalize_header(header);
        if normalized.insert(slug.clone(), value.clone()).is_some() {
            warn!("Column '{}' collides with an earlier column on slug '{}'", header, slug);
        }
    }

    normalized
}
