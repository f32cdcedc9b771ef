//! Demo: build every index over one dataset and time a few searches

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{bail, Context, Result};
use clap::Parser;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use simspace::{
    factory, Dataset, DistanceMetric, Index, KnnQuery, Neighbor, Params, Query, RangeQuery, Space,
    VectorSpace,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "simspace")]
#[command(about = "Build similarity search indexes and time queries against them", long_about = None)]
struct Cli {
    /// Dataset file with one vector per line. A generated dataset is used if omitted.
    file: Option<PathBuf>,

    /// Read at most this many objects from the file (0 reads all)
    #[arg(default_value_t = 100)]
    max_objects: usize,

    /// Number of neighbors for k-NN queries
    #[arg(short, long, default_value_t = 5)]
    k: usize,

    /// Radius for range queries
    #[arg(short, long, default_value_t = 0.12)]
    radius: f32,

    /// How many times each search is repeated for timing
    #[arg(long, default_value_t = 1000)]
    repetitions: usize,

    /// Print one JSON report per search instead of text
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Serialize)]
struct SearchReport {
    method: &'static str,
    query: String,
    index: String,
    repetitions: usize,
    avg_time_ms: f64,
    distance_computations: u64,
    results: Vec<Neighbor>,
}

impl SearchReport {
    fn print(&self, json: bool) -> Result<()> {
        if json {
            println!("{}", serde_json::to_string(self)?);
            return Ok(());
        }
        println!(
            "Search {} using index: {} repeated: {} times",
            self.query, self.index, self.repetitions
        );
        println!("Avg time: {:.4} ms", self.avg_time_ms);
        println!("Distance computations: {}", self.distance_computations);
        println!("# of results: {}", self.results.len());
        for n in &self.results {
            println!("{} : {}", n.id, n.distance);
        }
        Ok(())
    }
}

/// Run one search `repetitions` times, resetting the query in between.
fn do_search(index: &dyn Index, query: &mut dyn Query<'_>, repetitions: usize) -> Result<SearchReport> {
    let repetitions = repetitions.max(1);
    let start = Instant::now();
    for i in 0..repetitions {
        index.search(query)?;
        if i + 1 < repetitions {
            query.reset();
        }
    }
    let elapsed = start.elapsed();

    Ok(SearchReport {
        method: index.method_name(),
        query: query.kind().to_string(),
        index: index.description(),
        repetitions,
        avg_time_ms: elapsed.as_secs_f64() * 1000.0 / repetitions as f64,
        distance_computations: query.distance_computations(),
        results: query.sorted_results(),
    })
}

/// 1000 points in the unit cube, reproducible across runs.
fn generated_dataset(space: &VectorSpace<DistanceMetric>) -> Result<Dataset> {
    let mut rng = StdRng::seed_from_u64(0);
    let rows: Vec<Vec<f32>> = (0..1000)
        .map(|_| (0..3).map(|_| rng.gen::<f32>()).collect())
        .collect();
    Ok(space.create_dataset(&rows)?)
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("simspace=info".parse()?))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let vector_space = VectorSpace::from_metric(DistanceMetric::L2);

    let dataset = match &cli.file {
        Some(path) => vector_space
            .read_dataset(path, cli.max_objects)
            .with_context(|| format!("failed to read {}", path.display()))?,
        None => generated_dataset(&vector_space)?,
    };
    if dataset.len() < 2 {
        bail!("Too few data elements: {}", dataset.len());
    }

    let mut objects = dataset.into_objects();
    let query_object = objects.remove(0);
    let dataset = Arc::new(Dataset::new(objects)?);
    info!(
        objects = dataset.len(),
        source = %cli.file.as_ref().map(|p| p.display().to_string()).unwrap_or_else(|| "generated".into()),
        "using the first object as the query"
    );

    let space: Arc<dyn Space> = Arc::new(vector_space);
    let small_world = factory::create_method(
        "small_world_rand",
        space.clone(),
        dataset.clone(),
        &Params::parse(["NN=11", "initIndexAttempts=3", "initSearchAttempts=3", "indexThreadQty=4"])?,
    )?;
    let vptree = factory::create_method(
        "vptree",
        space.clone(),
        dataset.clone(),
        &Params::parse(["alphaLeft=1.0", "alphaRight=1.0"])?,
    )?;
    let mut perm = factory::create_method(
        "perm_incsort",
        space.clone(),
        dataset.clone(),
        &Params::parse(["dbScanFrac=0.2", "numPivot=16"])?,
    )?;

    // The small-world graph does not answer range queries.
    let mut range_query = RangeQuery::new(space.as_ref(), &query_object, cli.radius);
    for index in [&vptree, &perm] {
        range_query.reset();
        do_search(index.as_ref(), &mut range_query, cli.repetitions)?.print(cli.json)?;
    }

    let mut knn_query = KnnQuery::new(space.as_ref(), &query_object, cli.k);
    for index in [&small_world, &vptree] {
        knn_query.reset();
        do_search(index.as_ref(), &mut knn_query, cli.repetitions)?.print(cli.json)?;
    }

    for frac in ["0.05", "0.5"] {
        info!(dbScanFrac = frac, "changing a query-time parameter");
        perm.set_query_time_params(&Params::new().with("dbScanFrac", frac))?;
        knn_query.reset();
        do_search(perm.as_ref(), &mut knn_query, cli.repetitions)?.print(cli.json)?;
    }

    Ok(())
}
