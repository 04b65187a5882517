/// Embeds every input in one batched call against the OpenAI embeddings
/// endpoint.
pub async fn embed(
    http_client: &reqwest::Client,
    texts: &[String],
) -> anyhow::Result<Vec<Vec<f32>>> {
    let api_key = std::env::var("OPENAI_API_KEY").expect("OPENAI_API_KEY not set");
    let resp = http_client
        .post("https://api.openai.com/v1/embeddings")
        .bearer_auth(&api_key)
        .json(&serde_json::json!({
            "model": "text-embedding-3-small",
            "input": texts,
        }))
        .send()
        .await?
        .json::<serde_json::Value>()
        .await?;

    let data = resp["data"]
        .as_array()
        .ok_or_else(|| anyhow::anyhow!("No data array"))?;
    let mut vectors = Vec::with_capacity(data.len());
    for entry in data {
        let embedding: Vec<f32> = serde_json::from_value(entry["embedding"].clone())?;
        vectors.push(embedding);
    }
    Ok(vectors)
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}
