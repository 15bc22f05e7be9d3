//! Interpretation styles (personas): static system prompts keyed by name.

use crate::{errors::Error, Result};

/// A named system-prompt template controlling interpretation tone.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PersonaDefinition {
    pub name: String,
    pub system_prompt: String,
}

impl PersonaDefinition {
    pub fn new(name: impl Into<String>, system_prompt: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            system_prompt: system_prompt.into(),
        }
    }
}

const BUILTIN: &[(&str, &str)] = &[
    (
        "Интуи",
        "Ты — Интуи, виртуальная интерпретаторка снов. \
Твой стиль — тёплый, философский, обволакивающий. \
Ты используешь образы, метафоры, мягкие советы. \
Анализируй каждый сон как отражение внутреннего мира человека. \
Заверши ответ отдельной строкой, начинающейся с «Совет:».",
    ),
    (
        "Мистик",
        "Ты — Интуи в образе мистика. Толкуй сны через символы, знаки и древние архетипы, \
говори загадочно и образно, словно читаешь послание из другого мира. \
Заверши ответ отдельной строкой, начинающейся с «Совет:».",
    ),
    (
        "Психолог",
        "Ты — Интуи в роли бережного психолога. Рассматривай сон как отражение эмоций, \
тревог и желаний человека, опирайся на идеи Юнга и Фрейда, избегай диагнозов. \
Заверши ответ отдельной строкой, начинающейся с «Совет:».",
    ),
    (
        "Поэт",
        "Ты — Интуи-поэт. Пересказывай смысл сна лёгкой поэтичной прозой или коротким \
верлибром, с яркими метафорами и мягкой интонацией. \
Заверши ответ отдельной строкой, начинающейся с «Совет:».",
    ),
    (
        "Философ",
        "Ты — Интуи-философ. Размышляй о сне как о вопросе, который человек задаёт себе, \
ищи в нём темы свободы, выбора и смысла, отвечай спокойно и глубоко. \
Заверши ответ отдельной строкой, начинающейся с «Совет:».",
    ),
];

/// Fixed, process-wide mapping from style name to persona.
///
/// Iteration order is the construction order and never changes, so the
/// selection menu (and its index-based callback tokens) stays stable.
#[derive(Clone, Debug)]
pub struct PersonaRegistry {
    personas: Vec<PersonaDefinition>,
    default_idx: usize,
}

impl PersonaRegistry {
    /// Build a registry from explicit definitions.
    ///
    /// Fails if names repeat or `default_style` is not among them.
    pub fn new(personas: Vec<PersonaDefinition>, default_style: &str) -> Result<Self> {
        for (i, p) in personas.iter().enumerate() {
            if personas[..i].iter().any(|q| q.name == p.name) {
                return Err(Error::Config(format!("duplicate style name: {}", p.name)));
            }
        }
        let default_idx = personas
            .iter()
            .position(|p| p.name == default_style)
            .ok_or_else(|| Error::Config(format!("unknown default style: {default_style}")))?;

        Ok(Self {
            personas,
            default_idx,
        })
    }

    /// The bot's built-in styles.
    pub fn builtin(default_style: &str) -> Result<Self> {
        let personas = BUILTIN
            .iter()
            .map(|(name, prompt)| PersonaDefinition::new(*name, *prompt))
            .collect();
        Self::new(personas, default_style)
    }

    /// Definition for `style`, or the default style's definition if unknown.
    pub fn resolve(&self, style: &str) -> &PersonaDefinition {
        self.personas
            .iter()
            .find(|p| p.name == style)
            .unwrap_or_else(|| self.default_persona())
    }

    pub fn default_persona(&self) -> &PersonaDefinition {
        &self.personas[self.default_idx]
    }

    pub fn default_style(&self) -> &str {
        &self.default_persona().name
    }

    pub fn list_styles(&self) -> impl Iterator<Item = &str> + '_ {
        self.personas.iter().map(|p| p.name.as_str())
    }

    pub fn by_index(&self, idx: usize) -> Option<&PersonaDefinition> {
        self.personas.get(idx)
    }

    pub fn position(&self, style: &str) -> Option<usize> {
        self.personas.iter().position(|p| p.name == style)
    }

    pub fn len(&self) -> usize {
        self.personas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.personas.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_style_resolves_to_default() {
        let reg = PersonaRegistry::builtin("Интуи").unwrap();
        for name in ["", "мистик", "style_Мистик", "Nope"] {
            assert_eq!(reg.resolve(name), reg.resolve("Интуи"));
        }
        assert_eq!(reg.resolve("Мистик").name, "Мистик");
    }

    #[test]
    fn list_styles_is_stable() {
        let reg = PersonaRegistry::builtin("Поэт").unwrap();
        let a: Vec<&str> = reg.list_styles().collect();
        let b: Vec<&str> = reg.list_styles().collect();
        assert_eq!(a, b);
        assert_eq!(a.len(), reg.len());
        assert_eq!(reg.default_style(), "Поэт");
    }

    #[test]
    fn rejects_unknown_default_and_duplicates() {
        assert!(matches!(
            PersonaRegistry::builtin("Шаман"),
            Err(Error::Config(_))
        ));

        let dup = vec![
            PersonaDefinition::new("a", "x"),
            PersonaDefinition::new("a", "y"),
        ];
        assert!(PersonaRegistry::new(dup, "a").is_err());
    }

    #[test]
    fn index_lookup_matches_listing() {
        let reg = PersonaRegistry::builtin("Интуи").unwrap();
        for (idx, name) in reg.list_styles().enumerate() {
            assert_eq!(reg.by_index(idx).map(|p| p.name.as_str()), Some(name));
            assert_eq!(reg.position(name), Some(idx));
        }
        assert!(reg.by_index(reg.len()).is_none());
    }
}
