//! Fitting instructions and evidence into the generation model's window.
//!
//! The trimmer is strictly greedy and order-preserving: meta lines first,
//! then evidence blocks, each category stopping at the first block that would
//! overflow. Smaller later blocks are never tried, so the kept evidence is
//! always a prefix of the ranked evidence.

use super::truncate_chars;
use tracing::{debug, warn};

/// Heading placed before the kept meta lines.
const META_HEADER: &str = "Source context (titles, timestamps, links):";
/// Heading placed before the kept evidence blocks.
const EVIDENCE_HEADER: &str = "Lecture excerpts:";

/// Token counting for a specific generation model.
pub trait Tokenizer: Send + Sync {
    /// Number of tokens the model sees for `text`.
    fn count_tokens(&self, text: &str) -> usize;

    /// The longest suffix of `text` that fits in `max_tokens`.
    fn keep_last_tokens(&self, text: &str, max_tokens: usize) -> String;
}

/// Character-ratio token estimate.
///
/// One token per `chars_per_token` characters, rounded up. Counts Unicode
/// scalar values rather than bytes so Urdu and Hindi text is not
/// overestimated four-fold.
#[derive(Debug, Clone, Copy)]
pub struct HeuristicTokenizer {
    chars_per_token: usize,
}

impl HeuristicTokenizer {
    /// Create a tokenizer with the given ratio (minimum 1).
    pub fn new(chars_per_token: usize) -> Self {
        Self {
            chars_per_token: chars_per_token.max(1),
        }
    }
}

impl Default for HeuristicTokenizer {
    fn default() -> Self {
        Self::new(4)
    }
}

impl Tokenizer for HeuristicTokenizer {
    fn count_tokens(&self, text: &str) -> usize {
        text.chars().count().div_ceil(self.chars_per_token)
    }

    fn keep_last_tokens(&self, text: &str, max_tokens: usize) -> String {
        let total = text.chars().count();
        let keep = max_tokens.saturating_mul(self.chars_per_token);
        text.chars().skip(total.saturating_sub(keep)).collect()
    }
}

/// The budget-respecting material handed to generation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PromptPlan {
    pub instruction_prefix: String,
    pub kept_meta_lines: Vec<String>,
    pub kept_evidence_blocks: Vec<String>,
}

impl PromptPlan {
    fn prefix_only(prefix: String) -> Self {
        Self {
            instruction_prefix: prefix,
            ..Default::default()
        }
    }

    /// Whether any meta lines or evidence survived trimming.
    pub fn has_evidence(&self) -> bool {
        !self.kept_meta_lines.is_empty() || !self.kept_evidence_blocks.is_empty()
    }

    /// Assemble the final prompt string.
    pub fn render(&self) -> String {
        let mut prompt = self.instruction_prefix.clone();

        if !self.kept_meta_lines.is_empty() {
            prompt.push_str("\n\n");
            prompt.push_str(META_HEADER);
            prompt.push('\n');
            prompt.push_str(&self.kept_meta_lines.join("\n"));
        }

        if !self.kept_evidence_blocks.is_empty() {
            prompt.push_str("\n\n");
            prompt.push_str(EVIDENCE_HEADER);
            prompt.push('\n');
            prompt.push_str(&self.kept_evidence_blocks.join("\n"));
        }

        prompt
    }
}

/// Token budget for one generation model.
#[derive(Debug, Clone, Copy)]
pub struct PromptBudget {
    max_context_tokens: usize,
    max_new_tokens: usize,
    safety_margin: usize,
    max_block_chars: usize,
}

impl PromptBudget {
    /// Create a budget for a model window, reserving room for the answer.
    pub fn new(max_context_tokens: usize, max_new_tokens: usize, safety_margin: usize) -> Self {
        Self {
            max_context_tokens,
            max_new_tokens,
            safety_margin,
            max_block_chars: 1500,
        }
    }

    /// Cap each meta line or evidence block before it is tokenized.
    pub fn with_max_block_chars(mut self, max_block_chars: usize) -> Self {
        self.max_block_chars = max_block_chars;
        self
    }

    /// Tokens available to the prompt.
    pub fn budget(&self) -> usize {
        self.max_context_tokens
            .saturating_sub(self.max_new_tokens)
            .saturating_sub(self.safety_margin)
    }

    /// Fit the prefix, meta lines and evidence into the budget.
    pub fn trim(
        &self,
        tokenizer: &dyn Tokenizer,
        prefix: &str,
        meta_lines: &[String],
        evidence_blocks: &[String],
    ) -> PromptPlan {
        let budget = self.budget();
        let prefix_tokens = tokenizer.count_tokens(prefix);

        if prefix_tokens > budget {
            warn!(
                "Instruction prefix ({} tokens) exceeds budget ({}); keeping its tail",
                prefix_tokens, budget
            );
            return PromptPlan::prefix_only(tokenizer.keep_last_tokens(prefix, budget));
        }

        let mut used = prefix_tokens;
        let kept_meta_lines = self.take_greedy(tokenizer, meta_lines, budget, &mut used);
        let kept_evidence_blocks = self.take_greedy(tokenizer, evidence_blocks, budget, &mut used);

        let plan = PromptPlan {
            instruction_prefix: prefix.to_string(),
            kept_meta_lines,
            kept_evidence_blocks,
        };

        let total = tokenizer.count_tokens(&plan.render());
        if total > budget {
            debug!(
                "Assembled prompt is {} tokens (budget {}); falling back to prefix only",
                total, budget
            );
            return PromptPlan::prefix_only(prefix.to_string());
        }

        debug!(
            "Prompt plan: {} meta lines, {} evidence blocks, {} of {} tokens",
            plan.kept_meta_lines.len(),
            plan.kept_evidence_blocks.len(),
            total,
            budget
        );
        plan
    }

    fn take_greedy(
        &self,
        tokenizer: &dyn Tokenizer,
        blocks: &[String],
        budget: usize,
        used: &mut usize,
    ) -> Vec<String> {
        let mut kept = Vec::new();
        for block in blocks {
            let block = truncate_chars(block.trim(), self.max_block_chars);
            if block.is_empty() {
                continue;
            }
            let tokens = tokenizer.count_tokens(block);
            if *used + tokens > budget {
                break;
            }
            *used += tokens;
            kept.push(block.to_string());
        }
        kept
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blocks(sizes: &[usize], ch: char) -> Vec<String> {
        sizes.iter().map(|&n| ch.to_string().repeat(n)).collect()
    }

    #[test]
    fn test_heuristic_tokenizer() {
        let t = HeuristicTokenizer::default();
        assert_eq!(t.count_tokens(""), 0);
        assert_eq!(t.count_tokens("test"), 1);
        assert_eq!(t.count_tokens("hello"), 2);
        assert_eq!(t.count_tokens("سوال"), 1);
        assert_eq!(t.keep_last_tokens("abcdefghij", 2), "cdefghij");
        assert_eq!(t.keep_last_tokens("abc", 5), "abc");
    }

    #[test]
    fn test_budget_arithmetic() {
        assert_eq!(PromptBudget::new(1024, 200, 32).budget(), 792);
        assert_eq!(PromptBudget::new(100, 200, 32).budget(), 0);
    }

    #[test]
    fn test_oversized_prefix_keeps_tail_only() {
        let t = HeuristicTokenizer::default();
        let budget = PromptBudget::new(20, 5, 5); // 10 tokens = 40 chars
        let prefix = format!("{}Question: why?", "boilerplate ".repeat(10));

        let plan = budget.trim(&t, &prefix, &blocks(&[4], 'm'), &blocks(&[4], 'e'));
        assert!(!plan.has_evidence());
        assert!(plan.instruction_prefix.ends_with("Question: why?"));
        assert!(t.count_tokens(&plan.render()) <= 10);
    }

    #[test]
    fn test_greedy_stops_at_first_overflow() {
        let t = HeuristicTokenizer::new(1);
        let budget = PromptBudget::new(200, 0, 0);
        let prefix = "p".repeat(10);
        // Meta: 10 + 20 = 30; evidence: 30 + 50 = 80, then 150 overflows and
        // the small trailing block is not tried.
        let plan = budget.trim(
            &t,
            &prefix,
            &blocks(&[20], 'm'),
            &blocks(&[50, 150, 5], 'e'),
        );
        assert_eq!(plan.kept_meta_lines.len(), 1);
        assert_eq!(plan.kept_evidence_blocks, blocks(&[50], 'e'));
    }

    #[test]
    fn test_blocks_capped_before_counting() {
        let t = HeuristicTokenizer::new(1);
        let budget = PromptBudget::new(1000, 0, 0).with_max_block_chars(10);
        let plan = budget.trim(&t, "q", &[], &blocks(&[500, 500], 'e'));
        assert_eq!(plan.kept_evidence_blocks, blocks(&[10, 10], 'e'));
    }

    #[test]
    fn test_non_additive_overflow_falls_back_to_prefix() {
        // Block sums fit exactly, but headers and separators push the
        // rendered prompt over.
        let t = HeuristicTokenizer::new(1);
        let budget = PromptBudget::new(30, 0, 0);
        let plan = budget.trim(&t, "0123456789", &[], &blocks(&[20], 'e'));
        assert_eq!(plan, PromptPlan::prefix_only("0123456789".to_string()));
    }

    #[test]
    fn test_rendered_prompt_never_exceeds_budget() {
        let tokenizers = [HeuristicTokenizer::new(1), HeuristicTokenizer::new(4)];
        for t in &tokenizers {
            for window in [16, 64, 256, 1024] {
                for prefix_len in [0, 7, 60, 400, 5000] {
                    let budget = PromptBudget::new(window, window / 4, 8).with_max_block_chars(300);
                    let prefix = "q".repeat(prefix_len);
                    let meta = blocks(&[30, 45, 12], 'm');
                    let evidence = blocks(&[120, 700, 33, 5, 90], 'e');

                    let plan = budget.trim(t, &prefix, &meta, &evidence);
                    assert!(
                        t.count_tokens(&plan.render()) <= budget.budget(),
                        "window {} prefix {}",
                        window,
                        prefix_len
                    );
                }
            }
        }
    }

    #[test]
    fn test_render_sections() {
        let plan = PromptPlan {
            instruction_prefix: "Q".to_string(),
            kept_meta_lines: vec!["m1".to_string()],
            kept_evidence_blocks: vec!["e1".to_string(), "e2".to_string()],
        };
        assert_eq!(
            plan.render(),
            format!("Q\n\n{}\nm1\n\n{}\ne1\ne2", META_HEADER, EVIDENCE_HEADER)
        );
        assert_eq!(PromptPlan::prefix_only("Q".to_string()).render(), "Q");
    }
}
