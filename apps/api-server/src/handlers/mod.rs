//! HTTP handlers and route configuration.

mod account;
mod health;
mod prompts;
mod roadmap;
mod social;
mod stream;

use actix_web::web;

/// Configure all application routes.
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .route("/health", web::get().to(health::health_check))
            // Catalog
            .service(
                web::scope("/prompts")
                    .route("", web::get().to(prompts::list_prompts))
                    .route("", web::post().to(prompts::create_prompt))
                    .route("/search", web::get().to(prompts::search_prompts))
                    .route("/batch", web::post().to(prompts::batch_prompts))
                    .route("/{id}", web::get().to(prompts::get_prompt))
                    .route("/{id}", web::put().to(prompts::update_prompt))
                    .route("/{id}", web::delete().to(prompts::delete_prompt))
                    .route("/{id}/like", web::post().to(social::toggle_like))
                    .route("/{id}/unlock", web::post().to(social::unlock))
                    .route("/{id}/views", web::post().to(prompts::record_view))
                    .route("/{id}/downloads", web::post().to(prompts::record_download))
                    .route("/{id}/comments", web::post().to(prompts::add_comment)),
            )
            .route("/authors/{id}/prompts", web::get().to(prompts::author_prompts))
            // Follow graph
            .service(
                web::resource("/users/{id}/follow")
                    .route(web::get().to(social::follow_status))
                    .route(web::post().to(social::follow))
                    .route(web::delete().to(social::unfollow)),
            )
            // Own account
            .service(
                web::scope("/me")
                    .route("", web::get().to(account::me))
                    .route("", web::patch().to(account::update_profile))
                    .route("", web::delete().to(account::delete_account))
                    .route("/activity", web::get().to(account::activity))
                    .route("/generations", web::post().to(account::record_generation)),
            )
            // Roadmap
            .route("/models", web::get().to(roadmap::list_models))
            .route("/features", web::get().to(roadmap::list_features))
            .route(
                "/features/{id}/subscribe",
                web::post().to(roadmap::toggle_subscription),
            )
            // Live updates
            .service(
                web::scope("/stream")
                    .route("/prompts/{id}", web::get().to(stream::prompt_stream))
                    .route("/authors/{id}", web::get().to(stream::author_stream))
                    .route("/me", web::get().to(stream::account_stream)),
            ),
    );
}
