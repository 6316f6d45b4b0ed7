// src/routes.rs

use actix_web::{error::InternalError, web, HttpResponse, ResponseError};
use log::debug;

use crate::auth::Authentication;
use crate::error::ApiError;
use crate::tasks::{add_list, delete_list, get_list, get_todos, update_list};
use crate::users::{
    change_password_handler, forgot_password, get_profile, login, register,
    reset_password_handler, update_profile_handler,
};

/// Malformed bodies and query strings get the same JSON error shape as
/// everything else.
fn json_config() -> web::JsonConfig {
    web::JsonConfig::default().error_handler(|err, _req| {
        debug!("Rejected JSON body: {}", err);
        let api_error = ApiError::BadRequest(format!("Invalid request body: {}", err));
        let response: HttpResponse = api_error.error_response();
        InternalError::from_response(err, response).into()
    })
}

fn query_config() -> web::QueryConfig {
    web::QueryConfig::default().error_handler(|err, _req| {
        debug!("Rejected query string: {}", err);
        let api_error = ApiError::BadRequest(format!("Invalid query string: {}", err));
        let response: HttpResponse = api_error.error_response();
        InternalError::from_response(err, response).into()
    })
}

/// Public credential routes plus the protected task and profile routes.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(json_config())
        .app_data(query_config())
        .route("/register", web::post().to(register))
        .route("/login", web::post().to(login))
        .route("/forgotpassword", web::post().to(forgot_password))
        .route("/resetpassword", web::put().to(reset_password_handler))
        .service(
            web::resource("/changepassword")
                .wrap(Authentication)
                .route(web::put().to(change_password_handler)),
        )
        .service(
            web::resource("/profile")
                .wrap(Authentication)
                .route(web::get().to(get_profile))
                .route(web::put().to(update_profile_handler)),
        )
        .service(
            web::resource("/addlist")
                .wrap(Authentication)
                .route(web::post().to(add_list)),
        )
        .service(
            web::resource("/todos")
                .wrap(Authentication)
                .route(web::get().to(get_todos)),
        )
        .service(
            web::resource("/getlist/{id}")
                .wrap(Authentication)
                .route(web::get().to(get_list)),
        )
        .service(
            web::resource("/updatelist/{id}")
                .wrap(Authentication)
                .route(web::put().to(update_list)),
        )
        .service(
            web::resource("/deletelist/{id}")
                .wrap(Authentication)
                .route(web::delete().to(delete_list)),
        );
}
