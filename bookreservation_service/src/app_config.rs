use paperclip::actix::web;

use crate::handlers;

pub fn config_app(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/health").route(web::get().to(handlers::health)))
        .service(
            web::scope("/api")
                .service(
                    web::resource("/books")
                        .route(web::get().to(handlers::get_all_books))
                        .route(web::post().to(handlers::add_book)),
                )
                .service(
                    web::resource("/books/reserved")
                        .route(web::get().to(handlers::get_reserved_books)),
                )
                .service(
                    web::resource("/books/available")
                        .route(web::get().to(handlers::get_available_books)),
                )
                .service(
                    web::scope("/book/{book_id}")
                        .service(
                            web::resource("")
                                .route(web::get().to(handlers::get_book))
                                .route(web::put().to(handlers::replace_book))
                                .route(web::delete().to(handlers::delete_book)),
                        )
                        .service(
                            web::resource("/history")
                                .route(web::get().to(handlers::get_book_history)),
                        )
                        .service(
                            web::resource("/reservation")
                                .route(web::post().to(handlers::reserve_book))
                                .route(web::delete().to(handlers::unreserve_book)),
                        ),
                ),
        );
}
