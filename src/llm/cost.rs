use crate::llm::ModelUsage;

/// Per-million-token rates, in USD, for one model (`spec.md` §4.7).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelRate {
    pub prompt_per_million: f64,
    pub completion_per_million: f64,
}

/// Looks up the rate table by model name, falling back to a conservative
/// default for unrecognized models so cost accounting never silently reads
/// as free.
fn rate_for_model(model: &str) -> ModelRate {
    match model {
        "gpt-4o" => ModelRate {
            prompt_per_million: 2.50,
            completion_per_million: 10.00,
        },
        "gpt-4o-mini" => ModelRate {
            prompt_per_million: 0.15,
            completion_per_million: 0.60,
        },
        "gpt-4-turbo" => ModelRate {
            prompt_per_million: 10.00,
            completion_per_million: 30.00,
        },
        "o1-mini" => ModelRate {
            prompt_per_million: 1.10,
            completion_per_million: 4.40,
        },
        _ => ModelRate {
            prompt_per_million: 5.00,
            completion_per_million: 15.00,
        },
    }
}

/// Computes the USD cost of one completion: `prompt_tokens × rateₚ +
/// completion_tokens × rateₒ` (`spec.md` §4.7).
pub fn cost_usd(model: &str, usage: ModelUsage) -> f64 {
    let rate = rate_for_model(model);
    let prompt_cost = usage.input_tokens as f64 * rate.prompt_per_million / 1_000_000.0;
    let completion_cost = usage.output_tokens as f64 * rate.completion_per_million / 1_000_000.0;
    prompt_cost + completion_cost
}
