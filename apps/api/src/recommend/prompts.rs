// Prompt assembly for product recommendations.
// The customer's prompt.txt supplies the instructions; everything else is data.

use crate::recommend::tables::{find_product_row, render_row};

/// Everything that goes into one recommendation prompt.
pub struct PromptInputs<'a> {
    pub instructions: &'a str,
    pub base_csv: &'a str,
    pub industry: &'a str,
    pub industry_csv: &'a str,
    pub product_name: &'a str,
}

/// Concatenates instructions, base table, industry table, any rows matching
/// the product, and the product being queried.
pub fn build_prompt(inputs: &PromptInputs<'_>) -> String {
    let mut prompt = format!(
        "{instructions}\n\n\
        Base product data:\n{base}\n\n\
        Industry product data ({industry}):\n{industry_csv}\n",
        instructions = inputs.instructions.trim(),
        base = inputs.base_csv.trim(),
        industry = inputs.industry,
        industry_csv = inputs.industry_csv.trim(),
    );

    let base_row = find_product_row(inputs.base_csv, inputs.product_name);
    let industry_row = find_product_row(inputs.industry_csv, inputs.product_name);
    if base_row.is_some() || industry_row.is_some() {
        prompt.push_str("\nMatched rows:\n");
        if let Some(row) = &base_row {
            prompt.push_str("Base:\n");
            prompt.push_str(&render_row(row));
        }
        if let Some(row) = &industry_row {
            prompt.push_str("Industry Variant:\n");
            prompt.push_str(&render_row(row));
        }
    }

    prompt.push_str(&format!(
        "\nProduct: {}\nIndustry: {}\n",
        inputs.product_name, inputs.industry
    ));
    prompt
}
