//! 分词
//!
//! 文档与查询共用同一分词规则：小写、去除阿拉伯语变音符号和延长符，
//! 再按非字母数字字符切分。

fn is_ignorable(c: char) -> bool {
    matches!(c, '\u{064B}'..='\u{065F}' | '\u{0670}' | '\u{0640}')
}

pub fn tokenize(text: &str) -> Vec<String> {
    let cleaned: String = text
        .chars()
        .filter(|c| !is_ignorable(*c))
        .flat_map(|c| c.to_lowercase())
        .collect();

    cleaned
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize_latin() {
        assert_eq!(
            tokenize("In the Name of Allah, the Merciful!"),
            vec!["in", "the", "name", "of", "allah", "the", "merciful"]
        );
    }

    #[test]
    fn test_tokenize_strips_diacritics() {
        // بِسْمِ اللَّهِ -> بسم الله
        assert_eq!(
            tokenize("بِسْمِ اللَّهِ"),
            vec!["بسم".to_string(), "الله".to_string()]
        );
        assert_eq!(tokenize("رحـــيم"), vec!["رحيم".to_string()]);
    }

    #[test]
    fn test_tokenize_empty() {
        assert!(tokenize("  ,.; ").is_empty());
    }
}
