//! One thin method per Bot API operation.
//!
//! Every method forwards its own operation name and the caller's parameters
//! to [`BotSession::request`] and returns the normalised body unchanged.
//! Binary fields are passed as [`Attachment`](telewire_transport::Attachment)
//! parameters:
//!
//! ```rust,ignore
//! session
//!     .send_photo(
//!         Params::new()
//!             .with("chat_id", chat_id)
//!             .with("photo", Attachment::new(png).with_file_name("chart.png")),
//!     )
//!     .await?;
//! ```

use telewire_core::ApiResult;
use telewire_transport::{ApiResponse, Params};

use crate::session::BotSession;

macro_rules! api_methods {
    ($($name:ident => $method:literal),* $(,)?) => {
        impl BotSession {
            $(
                #[doc = concat!("Calls `", $method, "`.")]
                pub async fn $name(&self, params: Params) -> ApiResult<ApiResponse> {
                    self.request($method, params).await
                }
            )*
        }

        /// Every operation with a generated method, `getUpdates` included.
        pub const API_METHODS: &[&str] = &["getUpdates", $($method),*];
    };
}

api_methods! {
    // Webhooks and identity
    set_webhook => "setWebhook",
    delete_webhook => "deleteWebhook",
    get_webhook_info => "getWebhookInfo",
    get_me => "getMe",
    // Sending
    send_message => "sendMessage",
    forward_message => "forwardMessage",
    send_photo => "sendPhoto",
    send_audio => "sendAudio",
    send_document => "sendDocument",
    send_video => "sendVideo",
    send_animation => "sendAnimation",
    send_voice => "sendVoice",
    send_video_note => "sendVideoNote",
    send_media_group => "sendMediaGroup",
    send_location => "sendLocation",
    edit_message_live_location => "editMessageLiveLocation",
    stop_message_live_location => "stopMessageLiveLocation",
    send_venue => "sendVenue",
    send_contact => "sendContact",
    send_chat_action => "sendChatAction",
    // Files and profiles
    get_user_profile_photos => "getUserProfilePhotos",
    get_file => "getFile",
    // Chat administration
    kick_chat_member => "kickChatMember",
    unban_chat_member => "unbanChatMember",
    restrict_chat_member => "restrictChatMember",
    promote_chat_member => "promoteChatMember",
    export_chat_invite_link => "exportChatInviteLink",
    set_chat_photo => "setChatPhoto",
    delete_chat_photo => "deleteChatPhoto",
    set_chat_title => "setChatTitle",
    set_chat_description => "setChatDescription",
    pin_chat_message => "pinChatMessage",
    unpin_chat_message => "unpinChatMessage",
    leave_chat => "leaveChat",
    get_chat => "getChat",
    get_chat_administrators => "getChatAdministrators",
    get_chat_members_count => "getChatMembersCount",
    get_chat_member => "getChatMember",
    set_chat_sticker_set => "setChatStickerSet",
    delete_chat_sticker_set => "deleteChatStickerSet",
    // Callbacks and editing
    answer_callback_query => "answerCallbackQuery",
    edit_message_text => "editMessageText",
    edit_message_caption => "editMessageCaption",
    edit_message_media => "editMessageMedia",
    edit_message_reply_markup => "editMessageReplyMarkup",
    delete_message => "deleteMessage",
    // Stickers
    send_sticker => "sendSticker",
    get_sticker_set => "getStickerSet",
    upload_sticker_file => "uploadStickerFile",
    create_new_sticker_set => "createNewStickerSet",
    add_sticker_to_set => "addStickerToSet",
    set_sticker_position_in_set => "setStickerPositionInSet",
    delete_sticker_from_set => "deleteStickerFromSet",
    // Inline mode, payments, passport and games
    answer_inline_query => "answerInlineQuery",
    send_invoice => "sendInvoice",
    answer_shipping_query => "answerShippingQuery",
    answer_pre_checkout_query => "answerPreCheckoutQuery",
    set_passport_data_errors => "setPassportDataErrors",
    send_game => "sendGame",
    set_game_score => "setGameScore",
    get_game_high_scores => "getGameHighScores",
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedTransport;
    use serde_json::json;
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::time::Duration;
    use telewire_transport::Attachment;

    fn session(transport: &Arc<ScriptedTransport>) -> BotSession {
        BotSession::new("42:token", transport.clone(), Duration::from_secs(60))
    }

    #[test]
    fn test_method_names_are_unique() {
        let unique: HashSet<_> = API_METHODS.iter().collect();
        assert_eq!(unique.len(), API_METHODS.len());
        assert_eq!(API_METHODS.len(), 62);
    }

    #[test]
    fn test_method_surface_is_complete() {
        let expected = [
            "getUpdates", "setWebhook", "deleteWebhook", "getWebhookInfo",
            "getMe", "sendMessage", "forwardMessage", "sendPhoto",
            "sendAudio", "sendDocument", "sendVideo", "sendAnimation",
            "sendVoice", "sendVideoNote", "sendMediaGroup", "sendLocation",
            "editMessageLiveLocation", "stopMessageLiveLocation", "sendVenue", "sendContact",
            "sendChatAction", "getUserProfilePhotos", "getFile", "kickChatMember",
            "unbanChatMember", "restrictChatMember", "promoteChatMember", "exportChatInviteLink",
            "setChatPhoto", "deleteChatPhoto", "setChatTitle", "setChatDescription",
            "pinChatMessage", "unpinChatMessage", "leaveChat", "getChat",
            "getChatAdministrators", "getChatMembersCount", "getChatMember", "setChatStickerSet",
            "deleteChatStickerSet", "answerCallbackQuery", "editMessageText", "editMessageCaption",
            "editMessageMedia", "editMessageReplyMarkup", "deleteMessage", "sendSticker",
            "getStickerSet", "uploadStickerFile", "createNewStickerSet", "addStickerToSet",
            "setStickerPositionInSet", "deleteStickerFromSet", "answerInlineQuery", "sendInvoice",
            "answerShippingQuery", "answerPreCheckoutQuery", "setPassportDataErrors", "sendGame",
            "setGameScore", "getGameHighScores",
        ];
        assert_eq!(API_METHODS, expected);
    }

    #[tokio::test]
    async fn test_wrappers_forward_their_own_name() {
        let transport = Arc::new(ScriptedTransport::new());
        let s = session(&transport);

        s.send_message(Params::new().with("chat_id", 1).with("text", "hi"))
            .await
            .unwrap();
        s.get_chat_members_count(Params::new().with("chat_id", 1))
            .await
            .unwrap();
        s.answer_pre_checkout_query(Params::new()).await.unwrap();

        let methods: Vec<_> = transport.calls().into_iter().map(|c| c.method).collect();
        assert_eq!(
            methods,
            ["sendMessage", "getChatMembersCount", "answerPreCheckoutQuery"]
        );
    }

    #[tokio::test]
    async fn test_wrapper_passes_attachments_through() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_json(json!({ "ok": true, "result": { "message_id": 9 } }));
        let s = session(&transport);

        let response = s
            .send_document(
                Params::new()
                    .with("chat_id", 1)
                    .with("document", Attachment::new(b"%PDF".to_vec())),
            )
            .await
            .unwrap();
        assert_eq!(response.result(), Some(&json!({ "message_id": 9 })));
        assert!(transport.calls()[0].params.has_attachments());
    }
}
