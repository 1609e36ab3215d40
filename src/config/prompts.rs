//! Per-language prompt and message templates.
//!
//! Templates are data, not code: the pipeline resolves one
//! [`LanguageTemplate`] per request and never branches on language itself.
//! Any part of the table can be overridden by placing a `prompts.toml` file
//! in the custom prompts directory; strings it leaves out keep their
//! built-in values.

use crate::language::Language;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// All user-facing text for one language.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LanguageTemplate {
    /// Instruction prefix for generation. Must contain `{{question}}`.
    pub instruction: String,
    /// Terminal message when no evidence was found.
    pub no_result: String,
    /// Heading of the sources block.
    pub sources_header: String,
    /// Link label for each source.
    pub source_link: String,
    /// Shown when an answer came back empty after styling.
    pub empty_answer: String,
    /// Last-resort extractive answer, also used on request timeout.
    pub fallback_placeholder: String,
}

/// A `prompts.toml` entry for one language. Every string is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct TemplateOverride {
    instruction: Option<String>,
    no_result: Option<String>,
    sources_header: Option<String>,
    source_link: Option<String>,
    empty_answer: Option<String>,
    fallback_placeholder: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PromptsOverride {
    en: TemplateOverride,
    ur: TemplateOverride,
    hi: TemplateOverride,
    roman: TemplateOverride,
}

impl LanguageTemplate {
    fn apply(&mut self, overrides: TemplateOverride) {
        let fields = [
            (&mut self.instruction, overrides.instruction),
            (&mut self.no_result, overrides.no_result),
            (&mut self.sources_header, overrides.sources_header),
            (&mut self.source_link, overrides.source_link),
            (&mut self.empty_answer, overrides.empty_answer),
            (&mut self.fallback_placeholder, overrides.fallback_placeholder),
        ];
        for (field, value) in fields {
            if let Some(value) = value {
                *field = value;
            }
        }
    }
}

/// The language table plus custom variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Prompts {
    pub en: LanguageTemplate,
    pub ur: LanguageTemplate,
    pub hi: LanguageTemplate,
    pub roman: LanguageTemplate,
    /// Custom variables from config, available in all templates.
    #[serde(skip)]
    pub variables: HashMap<String, String>,
}

impl Default for Prompts {
    fn default() -> Self {
        Self {
            en: LanguageTemplate {
                instruction: r#"You are a scholar who explains lecture content clearly and concisely.
Respond ONLY in English. Use simple language and explain in your own words.
If the excerpts do not cover the question, say so politely.
Do NOT invent scholars, quotes, or sources.

Question:
{{question}}

Answer based on the lecture excerpts below:"#
                    .to_string(),
                no_result: "❌ Unfortunately, no relevant information found in video transcripts about this topic.".to_string(),
                sources_header: "**📺 Video Sources:**".to_string(),
                source_link: "Watch video".to_string(),
                empty_answer: "📖 Relevant information found in video.".to_string(),
                fallback_placeholder: "Relevant information is available in the video.".to_string(),
            },
            ur: LanguageTemplate {
                instruction: r#"آپ ایک عالم ہیں جو لیکچر کے مواد کو واضح اور مختصر انداز میں سمجھاتے ہیں۔
جواب صرف اردو میں دیں۔ صرف نیچے دیے گئے اقتباسات سے جواب دیں۔
اگر اقتباسات میں جواب موجود نہ ہو تو نرمی سے بتا دیں۔

سوال:
{{question}}

نیچے دی گئی معلومات سے جواب دو:"#
                    .to_string(),
                no_result: "❌ متاسف ہے کہ اس موضوع پر video transcripts میں معلومات نہیں مل سکیں۔".to_string(),
                sources_header: "**📺 ویڈیو کے ذرائع:**".to_string(),
                source_link: "ویڈیو دیکھیں".to_string(),
                empty_answer: "📖 ویڈیو میں متعلقہ معلومات ہے۔".to_string(),
                fallback_placeholder: "ویڈیو میں متعلقہ معلومات موجود ہے۔".to_string(),
            },
            hi: LanguageTemplate {
                instruction: r#"आप एक विद्वान हैं जो लेक्चर की सामग्री को स्पष्ट और संक्षेप में समझाते हैं।
जवाब केवल हिंदी में दें। केवल नीचे दिए गए अंशों से जवाब दें।
अगर अंशों में जवाब नहीं है तो विनम्रता से बताएं।

सवाल:
{{question}}

नीचे दी गई जानकारी से जवाब दें:"#
                    .to_string(),
                no_result: "❌ खेद है कि इस विषय पर video transcripts में जानकारी नहीं मिली।".to_string(),
                sources_header: "**📺 वीडियो स्रोत:**".to_string(),
                source_link: "वीडियो देखें".to_string(),
                empty_answer: "📖 वीडियो में प्रासंगिक जानकारी है।".to_string(),
                fallback_placeholder: "वीडियो में प्रासंगिक जानकारी है।".to_string(),
            },
            roman: LanguageTemplate {
                instruction: r#"Aap ek aalim hain jo lecture ka mawad wazeh aur mukhtasar andaaz mein samjhate hain.
Jawab sirf Roman Urdu mein dein. Sirf neeche diye gaye iqtibasaat se jawab dein.
Agar iqtibasaat mein jawab na ho to narmi se bata dein.

Sawal:
{{question}}

Neeche di gayi info se jawab do:"#
                    .to_string(),
                no_result: "❌ Maafi chaahta hoon, is topic par video transcripts mein koi information nahi mili.".to_string(),
                sources_header: "**📺 Video Sources:**".to_string(),
                source_link: "Video dekhein".to_string(),
                empty_answer: "📖 Video mein relevant information hai.".to_string(),
                fallback_placeholder: "Video mein relevant information hai.".to_string(),
            },
            variables: HashMap::new(),
        }
    }
}

impl Prompts {
    /// Load prompts, optionally overriding the table from a custom directory.
    pub fn load(
        custom_dir: Option<&str>,
        custom_variables: Option<&HashMap<String, String>>,
    ) -> crate::error::Result<Self> {
        let mut prompts = Prompts::default();

        if let Some(dir) = custom_dir {
            let path = PathBuf::from(shellexpand::tilde(dir).to_string()).join("prompts.toml");
            if path.exists() {
                let content = std::fs::read_to_string(&path)?;
                let overrides: PromptsOverride = toml::from_str(&content)?;
                prompts.en.apply(overrides.en);
                prompts.ur.apply(overrides.ur);
                prompts.hi.apply(overrides.hi);
                prompts.roman.apply(overrides.roman);
            }
        }

        if let Some(vars) = custom_variables {
            prompts.variables = vars.clone();
        }

        Ok(prompts)
    }

    /// Resolve the template for a language.
    pub fn for_language(&self, language: Language) -> &LanguageTemplate {
        match language {
            Language::English => &self.en,
            Language::Urdu => &self.ur,
            Language::Hindi => &self.hi,
            Language::RomanUrdu => &self.roman,
        }
    }

    /// Render a template with the given variables.
    pub fn render(template: &str, vars: &HashMap<String, String>) -> String {
        let mut result = template.to_string();
        for (key, value) in vars {
            result = result.replace(&format!("{{{{{}}}}}", key), value);
        }
        result
    }

    /// Render a template with both provided variables and custom config variables.
    /// Provided variables take precedence over custom config variables.
    pub fn render_with_custom(&self, template: &str, vars: &HashMap<String, String>) -> String {
        let mut merged = self.variables.clone();
        for (key, value) in vars {
            merged.insert(key.clone(), value.clone());
        }
        Self::render(template, &merged)
    }

    /// Instruction prefix for a question in the given language.
    pub fn instruction(&self, language: Language, question: &str) -> String {
        let mut vars = HashMap::new();
        vars.insert("question".to_string(), question.to_string());
        self.render_with_custom(&self.for_language(language).instruction, &vars)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_language_has_question_slot() {
        let prompts = Prompts::default();
        for lang in [Language::English, Language::Urdu, Language::Hindi, Language::RomanUrdu] {
            let t = prompts.for_language(lang);
            assert!(t.instruction.contains("{{question}}"), "{}", lang);
            assert!(!t.no_result.is_empty());
            assert!(!t.fallback_placeholder.is_empty());
        }
    }

    #[test]
    fn test_render_template() {
        let template = "Hello {{name}}, you have {{count}} messages.";
        let mut vars = HashMap::new();
        vars.insert("name".to_string(), "Alice".to_string());
        vars.insert("count".to_string(), "5".to_string());

        let result = Prompts::render(template, &vars);
        assert_eq!(result, "Hello Alice, you have 5 messages.");
    }

    #[test]
    fn test_instruction_uses_custom_variables() {
        let mut prompts = Prompts::default();
        prompts.en.instruction = "{{persona}}: {{question}}".to_string();
        prompts
            .variables
            .insert("persona".to_string(), "Teacher".to_string());

        assert_eq!(
            prompts.instruction(Language::English, "What is iman?"),
            "Teacher: What is iman?"
        );
    }

    #[test]
    fn test_load_custom_table() {
        let dir = tempfile::tempdir().unwrap();
        let mut custom = Prompts::default();
        custom.roman.no_result = "Kuch nahi mila".to_string();
        std::fs::write(
            dir.path().join("prompts.toml"),
            toml::to_string_pretty(&custom).unwrap(),
        )
        .unwrap();

        let loaded = Prompts::load(dir.path().to_str(), None).unwrap();
        assert_eq!(loaded.roman.no_result, "Kuch nahi mila");
        assert_eq!(loaded.en.source_link, "Watch video");
    }

    #[test]
    fn test_partial_override_keeps_builtin_strings() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("prompts.toml"),
            "[roman]\nno_result = \"Kuch nahi mila\"\n",
        )
        .unwrap();

        let loaded = Prompts::load(dir.path().to_str(), None).unwrap();
        let builtin = Prompts::default();
        assert_eq!(loaded.roman.no_result, "Kuch nahi mila");
        assert_eq!(loaded.roman.source_link, builtin.roman.source_link);
        assert_eq!(loaded.roman.instruction, builtin.roman.instruction);
        assert_eq!(loaded.ur.no_result, builtin.ur.no_result);
    }
}
