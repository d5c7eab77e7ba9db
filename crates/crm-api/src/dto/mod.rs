//! 请求 / 响应 DTO 定义

pub mod request;
pub mod response;

pub use request::{
    AddPurchaseRequest, CreateCampaignRequest, CreateCustomerRequest, CreateSegmentRequest,
    CustomerListQuery, DeliveryReceiptRequest, LogListQuery, PaginationParams,
    PreviewSegmentRequest, UpdateCampaignRequest, UpdateCustomerRequest, UpdateSegmentRequest,
    UpdateTagsRequest,
};

pub use response::{
    ApiResponse, CampaignStatsDto, CustomerPage, MessageStatusDto, PageResponse, PreviewResponse,
    SegmentWithCampaign,
};
