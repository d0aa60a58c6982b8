use std::sync::Mutex;

use actix_web::{get, put, web, App, HttpResponse, HttpServer, Responder};

use serde::Deserialize;

use log::info;
use rand::rngs::StdRng;

use memchain_core::cache::MemoryCache;
use memchain_core::error::ChainError;
use memchain_core::model::config::ChainConfig;
use memchain_core::model::follower_store::FollowerStore;
use memchain_core::model::generator::Generator;
use memchain_core::model::trainer::Trainer;

/// Retries per requested sentence when a length filter is set.
const MAX_DRAWS_PER_SENTENCE: usize = 5;

/// Struct representing query parameters for the `/v1/generate` endpoint
#[derive(Deserialize)]
struct GenerateParams {
	/// Token cap per sentence (default 100).
	limit: Option<usize>,
	/// Number of sentences to generate (default 1).
	count: Option<usize>,
	/// Drop sentences longer than this many characters, the way a
	/// posting platform would (e.g. 140).
	max_len: Option<usize>,
}

struct SharedData {
	trainer: Trainer<MemoryCache, StdRng>,
	generator: Generator<MemoryCache, StdRng>,
}

/// HTTP GET endpoint `/v1/generate`
///
/// Generates sentences from the trained chain. Each sentence is drawn
/// independently; responses carry one sentence per line.
#[get("/v1/generate")]
async fn get_generated(data: web::Data<Mutex<SharedData>>, query: web::Query<GenerateParams>) -> impl Responder {
	let limit = query.limit.unwrap_or(100);
	let count = query.count.unwrap_or(1);

	let mut shared_data = match data.lock() {
		Ok(m) => m,
		Err(_) => return HttpResponse::InternalServerError().body("Model lock failed"),
	};

	let mut lines = Vec::with_capacity(count);
	for _ in 0..count {
		for _ in 0..MAX_DRAWS_PER_SENTENCE {
			let sentence = match shared_data.generator.sentence(limit) {
				Ok(s) => s,
				Err(e) => return HttpResponse::InternalServerError().body(e.to_string()),
			};
			let fits = query.max_len.is_none_or(|max_len| sentence.len() <= max_len);
			if fits {
				lines.push(sentence);
				break;
			}
		}
	}

	HttpResponse::Ok().body(lines.join("\n"))
}

/// HTTP PUT endpoint `/v1/train`
///
/// Trains the chain on the request body, one text unit per line.
/// Responds with the number of (context, follower) pairs written.
#[put("/v1/train")]
async fn put_train(data: web::Data<Mutex<SharedData>>, body: String) -> impl Responder {
	let mut shared_data = match data.lock() {
		Ok(m) => m,
		Err(_) => return HttpResponse::InternalServerError().body("Model lock failed"),
	};

	let units = body.lines().filter(|line| !line.trim().is_empty());
	match shared_data.trainer.train_all(units) {
		Ok(written) => HttpResponse::Ok().body(written.to_string()),
		Err(e @ ChainError::UnknownTokenKind(_)) => HttpResponse::BadRequest().body(e.to_string()),
		Err(e) => HttpResponse::InternalServerError().body(e.to_string()),
	}
}

/// Main entry point for the server.
///
/// Builds the shared cache, wraps trainer and generator in a `Mutex`,
/// and starts an Actix-web HTTP server.
///
/// # Notes
/// - The server binds to 127.0.0.1:5000.
/// - The in-process cache backend keeps the server self-contained; a
///   networked cache client slots in through the same trait.
#[actix_web::main]
async fn main() -> std::io::Result<()> {
	env_logger::init();

	let cache = MemoryCache::new();
	let config = ChainConfig::default();
	let shared_data = SharedData {
		trainer: Trainer::new(FollowerStore::new(cache.clone()), config.clone()),
		generator: Generator::new(FollowerStore::new(cache), config),
	};
	let shared_model = web::Data::new(Mutex::new(shared_data));

	info!("listening on 127.0.0.1:5000");
	HttpServer::new(move || {
		App::new()
			.app_data(shared_model.clone())
			.service(get_generated)
			.service(put_train)
	})
		.bind(("127.0.0.1", 5000))?
		.run()
		.await
}
