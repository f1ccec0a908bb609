use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for CineMatch Back.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::rooms::create_room,
        crate::routes::rooms::join_room,
        crate::routes::rooms::get_room,
        crate::routes::rooms::start_room,
        crate::routes::rooms::cancel_room,
        crate::routes::rooms::leave_room,
        crate::routes::rooms::cast_vote,
        crate::routes::rooms::list_votes,
        crate::routes::rooms::list_matches,
        crate::routes::events::room_stream,
        crate::routes::catalog::room_feed,
        crate::routes::catalog::catalog_item,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::health::StorageProbe,
            crate::dto::room::CreateRoomRequest,
            crate::dto::room::RoomConfigInput,
            crate::dto::room::JoinRoomRequest,
            crate::dto::room::HostActionRequest,
            crate::dto::room::LeaveRoomRequest,
            crate::dto::room::RoomSummary,
            crate::dto::room::MemberSummary,
            crate::dto::vote::CastVoteRequest,
            crate::dto::vote::VoteOutcome,
            crate::dto::vote::VoteSummary,
            crate::dto::vote::MatchSummary,
            crate::dto::catalog::CatalogItem,
            crate::dto::sse::Handshake,
            crate::dao::models::RoomStatus,
            crate::dao::models::VoteDecision,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "rooms", description = "Room lifecycle and membership"),
        (name = "votes", description = "Vote ledger and match detection"),
        (name = "events", description = "Server-sent events streams"),
        (name = "catalog", description = "Catalog feed and item lookup"),
    )
)]
pub struct ApiDoc;
