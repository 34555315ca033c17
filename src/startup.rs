use actix_multipart::form::MultipartFormConfig;
use actix_web::dev::Server;
use actix_web::{middleware::Logger, web, App, HttpServer};
use std::net::TcpListener;
use std::sync::Arc;

use crate::cookies::SessionCookies;
use crate::error::{AppError, ValidationError};
use crate::logger::LoggerMiddleware;
use crate::media::MediaStore;
use crate::middleware::JwtMiddleware;
use crate::routes::{
    change_password, current_user, health_check, login, logout, refresh_token, register,
};
use crate::session::SessionManager;

pub fn run(
    listener: TcpListener,
    sessions: SessionManager,
    media: Arc<dyn MediaStore>,
    cookies: SessionCookies,
) -> Result<Server, std::io::Error> {
    let sessions_data = web::Data::new(sessions.clone());
    let media_data: web::Data<dyn MediaStore> = web::Data::from(media);
    let cookies_data = web::Data::new(cookies);

    let server = HttpServer::new(move || {
        // Malformed bodies render through the same envelope as every other failure
        let json_config = web::JsonConfig::default().error_handler(|err, _req| {
            AppError::Validation(ValidationError::InvalidFormat(format!("Request body ({})", err)))
                .into()
        });
        let multipart_config = MultipartFormConfig::default().error_handler(|err, _req| {
            AppError::Validation(ValidationError::InvalidFormat(format!("Multipart form ({})", err)))
                .into()
        });

        App::new()
            // Global middleware
            .wrap(Logger::default())
            .wrap(LoggerMiddleware)

            // Shared state
            .app_data(json_config)
            .app_data(multipart_config)
            .app_data(sessions_data.clone())
            .app_data(media_data.clone())
            .app_data(cookies_data.clone())

            .route("/health_check", web::get().to(health_check))
            .service(
                web::scope("/api/v1/users")
                    // Public routes
                    .route("/register", web::post().to(register))
                    .route("/login", web::post().to(login))
                    .route("/refresh-token", web::post().to(refresh_token))

                    // Protected routes (require access token)
                    .service(
                        web::resource("/logout")
                            .wrap(JwtMiddleware::new(sessions.clone()))
                            .route(web::post().to(logout)),
                    )
                    .service(
                        web::resource("/change-password")
                            .wrap(JwtMiddleware::new(sessions.clone()))
                            .route(web::patch().to(change_password)),
                    )
                    .service(
                        web::resource("/current-user")
                            .wrap(JwtMiddleware::new(sessions.clone()))
                            .route(web::get().to(current_user)),
                    ),
            )
    })
    .listen(listener)?
    .run();

    Ok(server)
}
