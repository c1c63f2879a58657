//! Product recommendations: customer CSV tables + prompt template → LLM.
//!
//! Nothing is cached. Every call re-reads the customer's objects and calls the
//! model once per requested product. The three reads are independent, so a
//! concurrent upload can be observed half-applied.

use std::collections::HashMap;

use futures_util::future::try_join_all;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::errors::AppError;
use crate::llm_client::{ChatMessage, CompletionClient, CompletionRequest};
use crate::recommend::prompts::{build_prompt, PromptInputs};
use crate::storage::keys::{self, validate_segment};
use crate::storage::{read_text, ObjectStore, StorageError};
use crate::upload::list_files;

pub mod handlers;
pub mod prompts;
pub mod tables;

pub const MAX_PRODUCTS: usize = 50;

#[derive(Debug, Clone, Deserialize)]
pub struct ProductQuery {
    #[serde(rename = "productName")]
    pub product_name: String,
    pub industry: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recommendation {
    #[serde(rename = "productName")]
    pub product_name: String,
    pub industry: String,
    pub recommendation: String,
}

/// Model settings for one recommendation run.
#[derive(Debug, Clone)]
pub struct RecommendParams {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

/// Industries available to a customer: top-level CSV files other than the
/// base file, without their extension, in listing order.
pub async fn list_industries(
    store: &dyn ObjectStore,
    customer_id: &str,
) -> Result<Vec<String>, AppError> {
    let files = list_files(store, customer_id).await?;
    Ok(files
        .iter()
        .filter_map(|f| keys::industry_from_filename(f))
        .map(str::to_string)
        .collect())
}

/// Produces one recommendation per product, in input order.
///
/// Fails with `NotFound` when the prompt template, the base file, or any
/// referenced industry file is missing, before any model call is made.
pub async fn recommend(
    store: &dyn ObjectStore,
    llm: &dyn CompletionClient,
    customer_id: &str,
    products: &[ProductQuery],
    params: &RecommendParams,
) -> Result<Vec<Recommendation>, AppError> {
    let customer_id = validate_segment("customer_id", customer_id)?;
    let products = validate_products(products)?;

    let instructions = read_required(
        store,
        &keys::object_key(&customer_id, keys::PROMPT_FILE),
        "Prompt template",
    )
    .await?;
    let base_csv = read_required(
        store,
        &keys::object_key(&customer_id, keys::BASE_FILE),
        "Base product file",
    )
    .await?;

    let mut industry_tables: HashMap<&str, String> = HashMap::new();
    for product in &products {
        if industry_tables.contains_key(product.industry.as_str()) {
            continue;
        }
        let table = read_required(
            store,
            &keys::industry_key(&customer_id, &product.industry),
            &format!("Industry file for '{}'", product.industry),
        )
        .await?;
        industry_tables.insert(product.industry.as_str(), table);
    }

    info!(
        "Requesting {} recommendation(s) for customer {}",
        products.len(),
        customer_id
    );

    let calls = products.iter().map(|product| {
        let prompt = build_prompt(&PromptInputs {
            instructions: &instructions,
            base_csv: &base_csv,
            industry: &product.industry,
            industry_csv: &industry_tables[product.industry.as_str()],
            product_name: &product.product_name,
        });
        let request = CompletionRequest {
            model: params.model.clone(),
            messages: vec![ChatMessage::user(prompt)],
            temperature: params.temperature,
            max_tokens: params.max_tokens,
        };
        async move {
            let completion = llm.complete(&request).await?;
            Ok::<_, AppError>(Recommendation {
                product_name: product.product_name.clone(),
                industry: product.industry.clone(),
                recommendation: completion.text,
            })
        }
    });

    try_join_all(calls).await
}

/// Trims names, checks the 1..=50 bound and keeps the base file out of the
/// industry slot.
fn validate_products(products: &[ProductQuery]) -> Result<Vec<ProductQuery>, AppError> {
    if products.is_empty() {
        return Err(AppError::Validation(
            "products must contain at least one entry".to_string(),
        ));
    }
    if products.len() > MAX_PRODUCTS {
        return Err(AppError::Validation(format!(
            "at most {MAX_PRODUCTS} products can be requested at once"
        )));
    }

    products
        .iter()
        .map(|p| {
            let product_name = p.product_name.trim();
            if product_name.is_empty() {
                return Err(AppError::Validation(
                    "productName cannot be empty".to_string(),
                ));
            }
            let industry = validate_segment("industry", &p.industry)?;
            if keys::is_base_industry(&industry) {
                return Err(AppError::Validation(format!(
                    "'{industry}' is reserved for the base product file"
                )));
            }
            Ok(ProductQuery {
                product_name: product_name.to_string(),
                industry,
            })
        })
        .collect()
}

async fn read_required(store: &dyn ObjectStore, key: &str, what: &str) -> Result<String, AppError> {
    read_text(store, key).await.map_err(|e| match e {
        StorageError::NotFound { key } => AppError::NotFound(format!("{what} not found at '{key}'")),
        other => other.into(),
    })
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;
    use crate::llm_client::stub::{EchoClient, StubMode};
    use crate::storage::memory::MemoryStore;

    fn params() -> RecommendParams {
        RecommendParams {
            model: "stub-model".to_string(),
            temperature: 0.4,
            max_tokens: 256,
        }
    }

    fn product(name: &str, industry: &str) -> ProductQuery {
        ProductQuery {
            product_name: name.to_string(),
            industry: industry.to_string(),
        }
    }

    async fn seeded_store() -> MemoryStore {
        let store = MemoryStore::new();
        for (key, body) in [
            ("c1/base.csv", "name,price\nWidget,9.99\n"),
            ("c1/healthcare.csv", "name,price\nStent,500"),
            ("c1/retail.csv", "name,price\nWidget,12.50"),
            ("c1/prompt.txt", "Recommend top product."),
        ] {
            store
                .put(key, Bytes::from_static(body.as_bytes()), None)
                .await
                .unwrap();
        }
        store
    }

    #[tokio::test]
    async fn test_recommend_worked_example() {
        let store = seeded_store().await;
        let llm = EchoClient::new();

        let result = recommend(
            &store,
            &llm,
            "c1",
            &[product("Widget", "healthcare")],
            &params(),
        )
        .await
        .unwrap();

        assert_eq!(result.len(), 1);
        assert!(!result[0].recommendation.is_empty());

        let requests = llm.requests();
        assert_eq!(requests.len(), 1);
        let prompt = &requests[0].messages[0].content;
        assert!(prompt.starts_with("Recommend top product."));
        assert!(prompt.contains("name,price\nWidget,9.99"));
        assert!(prompt.contains("name,price\nStent,500"));
        assert!(prompt.contains("Product: Widget\nIndustry: healthcare"));
        assert_eq!(requests[0].temperature, 0.4);
        assert_eq!(requests[0].max_tokens, 256);
    }

    #[tokio::test]
    async fn test_recommend_preserves_order_and_length() {
        let store = seeded_store().await;
        let llm = EchoClient::new();
        let products = vec![
            product("Widget", "retail"),
            product("Stent", "healthcare"),
            product("Widget", "healthcare"),
        ];

        let result = recommend(&store, &llm, "c1", &products, &params())
            .await
            .unwrap();

        assert_eq!(result.len(), products.len());
        for (rec, query) in result.iter().zip(&products) {
            assert_eq!(rec.product_name, query.product_name);
            assert_eq!(rec.industry, query.industry);
            assert!(rec
                .recommendation
                .contains(&format!("Product: {}\nIndustry: {}", query.product_name, query.industry)));
        }
    }

    #[tokio::test]
    async fn test_missing_industry_file_is_not_found() {
        let store = seeded_store().await;
        let llm = EchoClient::new();

        let err = recommend(
            &store,
            &llm,
            "c1",
            &[product("Widget", "retail"), product("Widget", "aerospace")],
            &params(),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, AppError::NotFound(ref msg) if msg.contains("c1/aerospace.csv")));
        assert!(llm.requests().is_empty());
    }

    #[tokio::test]
    async fn test_missing_prompt_or_base_is_not_found() {
        let store = MemoryStore::new();
        store
            .put("c2/healthcare.csv", Bytes::from_static(b"name\nStent"), None)
            .await
            .unwrap();
        let llm = EchoClient::new();

        let err = recommend(&store, &llm, "c2", &[product("Stent", "healthcare")], &params())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_upstream_failure_is_reported() {
        let store = seeded_store().await;
        let llm = EchoClient::with_mode(StubMode::FailUpstream);

        let err = recommend(
            &store,
            &llm,
            "c1",
            &[product("Widget", "retail")],
            &params(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::Upstream(_)));
    }

    #[tokio::test]
    async fn test_product_count_bounds() {
        let store = seeded_store().await;
        let llm = EchoClient::new();

        let none = recommend(&store, &llm, "c1", &[], &params()).await;
        assert!(matches!(none, Err(AppError::Validation(_))));

        let too_many = vec![product("Widget", "retail"); MAX_PRODUCTS + 1];
        let over = recommend(&store, &llm, "c1", &too_many, &params()).await;
        assert!(matches!(over, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_list_industries_excludes_reserved_files() {
        let store = seeded_store().await;
        store
            .put("c1/chat_files/other.csv", Bytes::from_static(b"x"), None)
            .await
            .unwrap();

        let industries = list_industries(&store, "c1").await.unwrap();

        assert_eq!(industries, vec!["healthcare", "retail"]);
        assert!(!industries.iter().any(|i| i == "base" || i == "prompt"));
    }

    #[tokio::test]
    async fn test_base_is_not_an_industry() {
        let store = seeded_store().await;
        let llm = EchoClient::new();

        let err = recommend(&store, &llm, "c1", &[product("Widget", "base")], &params())
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Validation(_)));
        assert!(llm.requests().is_empty());
    }

    #[tokio::test]
    async fn test_listed_industries_feed_back_into_recommend() {
        let store = seeded_store().await;
        for key in ["c1/Retail.CSV", "c1/Marine.csv"] {
            store
                .put(key, Bytes::from_static(b"name\nBuoy"), None)
                .await
                .unwrap();
        }
        let llm = EchoClient::new();

        let industries = list_industries(&store, "c1").await.unwrap();
        assert_eq!(industries, vec!["Marine", "healthcare", "retail"]);

        let products: Vec<ProductQuery> = industries
            .iter()
            .map(|industry| product("Buoy", industry))
            .collect();
        let result = recommend(&store, &llm, "c1", &products, &params())
            .await
            .unwrap();
        assert_eq!(result.len(), industries.len());
    }

    #[tokio::test]
    async fn test_list_industries_unknown_customer_is_empty() {
        let store = MemoryStore::new();
        assert!(list_industries(&store, "nobody").await.unwrap().is_empty());
    }
}
