//! Example: a tiny jukebox library.
//!
//! Demonstrates schema synchronization on first use, inserts with
//! identity write-back, and composed queries.
//!
//! Run with: cargo run --example jukebox -p velvet-orm

use velvet_orm::{Connection, Model, Result, col};

#[derive(Debug, Clone, Model)]
struct Track {
    id: i64,
    name: String,
    score: f64,
}

#[tokio::main]
async fn main() -> Result<()> {
    let db = Connection::open_in_memory().await?;
    let tracks = db.collection::<Track>("tracks");

    for (name, score) in [("Aria", 9.5), ("Bourrée", 7.2), ("Arabesque", 8.9)] {
        let track = tracks
            .add(Track {
                id: 0,
                name: String::from(name),
                score,
            })
            .await?;
        println!("stored #{}: {}", track.id, track.name);
    }

    let favorites = tracks
        .filter(col("score").gt(8.0).and(col("name").starts_with("Ar")))?
        .order_by_desc("score")?
        .fetch()
        .await?;

    println!("favorites starting with 'Ar':");
    for track in favorites {
        println!("  {:>4.1}  {}", track.score, track.name);
    }

    Ok(())
}
