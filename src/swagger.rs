use axum::Router;
use std::fs::{self, File};
use std::io::Write;
use std::path::PathBuf;
use utoipa::OpenApi;
use utoipa_axum::router::OpenApiRouter;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
	info(
		title = "Tomato Aggregator API",
		description = "The read-only semantic query API for the federated meeting-directory aggregator. \
		The query surface dispatches on the `switcher` parameter; `GetFieldKeys` enumerates the \
		projectable columns and `GetServerInfo` describes the deployment."
	),
	servers(
		(url = "http://localhost:8000", description = "Local development server"),
	)
)]
struct ApiDoc;

/// Merges swagger with the semantic routes and snapshots the document to
/// `docs/openapi.json` for clients that want it offline.
pub fn merge_swagger(router: OpenApiRouter) -> Router {
	let doc = ApiDoc::openapi();
	let docs_path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("docs");
	fs::create_dir_all(&docs_path).expect("could not create docs directory");
	let mut file = File::create(docs_path.join("openapi.json")).expect("could not create openapi.json");
	file.write_all(doc.to_pretty_json().expect("openapi document serializes").as_bytes())
		.expect("could not write openapi.json");
	let (router, api) = OpenApiRouter::with_openapi(doc).merge(router).split_for_parts();
	router.merge(SwaggerUi::new("/swagger").url("/docs/openapi.json", api))
}
