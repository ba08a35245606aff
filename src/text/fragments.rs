//! Фрагменты истории для иллюстраций и имя папки проекта.

/// Максимальная длина имени проекта (в символах)
const PROJECT_NAME_MAX: usize = 50;

/// Фрагменты для запросов картинок: текст делится по ". ", пустые отбрасываются
pub fn image_fragments(content: &str) -> Vec<String> {
    content
        .split(". ")
        .map(str::trim)
        .filter(|fragment| !fragment.is_empty())
        .map(str::to_string)
        .collect()
}

/// Имя папки проекта из начала текста до первой точки.
///
/// Пробелы заменяются на `_`, символы вне `[A-Za-z0-9_-]` и других букв удаляются.
/// Если ничего не осталось, используется `story_{fallback_id}`.
pub fn project_name(content: &str, fallback_id: &str) -> String {
    let title = content.split('.').next().unwrap_or_default();
    let prefix: String = title.chars().take(PROJECT_NAME_MAX).collect();

    let name: String = prefix
        .trim()
        .replace(' ', "_")
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '_' || *c == '-')
        .collect();

    if name.is_empty() {
        format!("story_{}", fallback_id)
    } else {
        name
    }
}

/// Кодирует фрагмент для подстановки в путь URL
pub fn prompt_url_path(prompt: &str) -> String {
    let mut encoded = String::with_capacity(prompt.len());
    for c in prompt.chars() {
        match c {
            '%' => encoded.push_str("%25"),
            ' ' => encoded.push_str("%20"),
            '\n' => encoded.push_str("%0A"),
            '\r' => encoded.push_str("%0D"),
            '?' => encoded.push_str("%3F"),
            '#' => encoded.push_str("%23"),
            '/' => encoded.push_str("%2F"),
            other => encoded.push(other),
        }
    }
    encoded
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_fragments_skip_empty() {
        let fragments = image_fragments("A cat sleeps. The moon rises. . Dawn comes.");
        assert_eq!(fragments, vec!["A cat sleeps", "The moon rises", "Dawn comes."]);

        assert!(image_fragments("").is_empty());
    }

    #[test]
    fn test_project_name() {
        assert_eq!(
            project_name("The Lighthouse Keeper. Once upon a time", "ab12"),
            "The_Lighthouse_Keeper"
        );
        let long = "a".repeat(80);
        assert_eq!(project_name(&long, "ab12").len(), 50);
        assert_eq!(project_name("Who? What/Why: *", "ab12"), "Who_WhatWhy_");
        assert_eq!(project_name(". starts with dot", "ab12"), "story_ab12");
    }

    #[test]
    fn test_prompt_url_path() {
        assert_eq!(prompt_url_path("a red fox"), "a%20red%20fox");
        assert_eq!(prompt_url_path("why? 50/50 #1"), "why%3F%2050%2F50%20%231");
    }
}
