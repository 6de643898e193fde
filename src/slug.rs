//! Filesystem-safe names for harvested datasets.

use regex::Regex;
use std::sync::LazyLock;

static NON_SLUG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^a-z0-9]+").unwrap());

/// Latin spelling of a lowercase Cyrillic letter, or `None` for any other character.
fn transliterate(c: char) -> Option<&'static str> {
    let latin = match c {
        'а' => "a",
        'б' => "b",
        'в' => "v",
        'г' => "g",
        'д' => "d",
        'е' => "e",
        'ё' => "yo",
        'ж' => "zh",
        'з' => "z",
        'и' => "i",
        'й' => "j",
        'к' => "k",
        'л' => "l",
        'м' => "m",
        'н' => "n",
        'о' => "o",
        'п' => "p",
        'р' => "r",
        'с' => "s",
        'т' => "t",
        'у' => "u",
        'ф' => "f",
        'х' => "h",
        'ц' => "c",
        'ч' => "ch",
        'ш' => "sh",
        'щ' => "shch",
        'ъ' => "",
        'ы' => "y",
        'ь' => "",
        'э' => "e",
        'ю' => "yu",
        'я' => "ya",
        _ => return None,
    };
    Some(latin)
}

/// Converts free text into a lowercase `[a-z0-9_]` token.
///
/// Cyrillic letters are transliterated one by one, every run of other characters
/// becomes a single underscore, and leading or trailing underscores are dropped.
///
/// ```
/// assert_eq!(harvestbot::slug::slugify("C# Разработчик"), "c_razrabotchik");
/// ```
pub fn slugify(text: &str) -> String {
    let latin: String = text
        .to_lowercase()
        .chars()
        .map(|c| match transliterate(c) {
            Some(latin) => latin.to_string(),
            None => c.to_string(),
        })
        .collect();

    NON_SLUG.replace_all(&latin, "_").trim_matches('_').to_string()
}

/// Short label for an hh.ru region code, falling back to the code itself.
pub fn region_label(area: u32) -> String {
    match area {
        1 => "moscow".to_string(),
        2 => "saint_petersburg".to_string(),
        113 => "russia".to_string(),
        other => other.to_string(),
    }
}

/// File name of the dataset for a query and region, e.g. `resume_python_moscow.csv`.
pub fn dataset_file_name(query: &str, area: u32) -> String {
    format!("resume_{}_{}.csv", slugify(query), region_label(area))
}
