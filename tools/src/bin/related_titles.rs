use std::env;

use itertools::Itertools;
use tools::{cosine_similarity, embed};

fn similarity_label(sim: f32) -> &'static str {
    match sim {
        s if s >= 0.7 => "HIGH",
        s if s >= 0.4 => "AVERAGE",
        s if s >= 0.2 => "LOW",
        _ => "DISSIMILAR",
    }
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    let titles: Vec<String> = env::args().skip(1).collect();

    if titles.len() < 2 {
        eprintln!("Usage: related-titles <title1> <title2> [title3] ...");
        std::process::exit(1);
    }

    let http_client = reqwest::Client::new();

    let embeddings = match embed(&http_client, &titles).await {
        Ok(embeddings) => embeddings,
        Err(e) => {
            eprintln!("Error embedding titles: {:?}", e);
            std::process::exit(1);
        }
    };

    println!("Pairwise title similarities:\n");

    let pairs: Vec<_> = (0..titles.len()).combinations(2).collect();
    for pair in &pairs {
        let sim = cosine_similarity(&embeddings[pair[0]], &embeddings[pair[1]]);
        println!(
            "  {} <-> {}: {:.4} [{}]",
            titles[pair[0]],
            titles[pair[1]],
            sim,
            similarity_label(sim)
        );
    }

    println!("\nNearest neighbor per title:\n");

    for (i, title) in titles.iter().enumerate() {
        let best = (0..titles.len())
            .filter(|&j| j != i)
            .map(|j| (j, cosine_similarity(&embeddings[i], &embeddings[j])))
            .max_by(|a, b| a.1.total_cmp(&b.1));
        if let Some((j, sim)) = best {
            println!("  {} -> {} ({:.4})", title, titles[j], sim);
        }
    }
}
