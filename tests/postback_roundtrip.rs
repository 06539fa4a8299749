use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use std::sync::Arc;
use std::time::Duration;
use webforms::cache::{
    CacheError, CachePolicy, CachedContent, ClientRegistrar, FragmentRequest, FragmentState,
    MemoryFragmentStore, PartialCachingControl, RequestValues,
};
use webforms::formatter::{TypeRegistry, Value};
use webforms::{
    Control, EVENT_VALIDATION_FIELD, Page, PageError, PageFields, PageStateConfig,
    VIEW_STATE_FIELD,
};

const PAGE_TYPE: &str = "ASP.orders_aspx";

/// form1 (naming container) > [Name (control state), Go, Status]
fn build(config: &PageStateConfig, type_name: &str) -> Page {
    let mut page = Page::new(type_name, config, Arc::new(TypeRegistry::new())).unwrap();
    let form = page
        .controls_mut()
        .add_child(Control::new("form1").naming_container())
        .unwrap();
    form.add_child(Control::new("Name").with_control_state()).unwrap();
    form.add_child(Control::new("Go")).unwrap();
    form.add_child(Control::new("Status")).unwrap();
    page
}

fn control<'p>(page: &'p mut Page, index: usize) -> &'p mut Control {
    page.controls_mut()
        .child_mut(0)
        .unwrap()
        .child_mut(index)
        .unwrap()
}

fn posted(fields: &PageFields) -> RequestValues {
    let mut form = RequestValues::new();
    form.push(VIEW_STATE_FIELD, fields.view_state.clone());
    if let Some(validation) = &fields.event_validation {
        form.push(EVENT_VALIDATION_FIELD, validation.clone());
    }
    form
}

fn first_request(config: &PageStateConfig) -> PageFields {
    let mut page = build(config, PAGE_TYPE);
    // declarative value, set before tracking
    control(&mut page, 2).view_state_mut().set("CssClass", "status").unwrap();
    page.track_view_state();

    control(&mut page, 0)
        .control_state_mut()
        .unwrap()
        .set("SelectedIndex", 3)
        .unwrap();
    control(&mut page, 2).view_state_mut().set("Text", "Saved; 2 orders").unwrap();
    page.register_requires_postback("form1$Name");
    page.client_script_mut()
        .register_for_event_validation("form1$Go", Some("submit"));
    page.save_state().unwrap()
}

#[test]
fn postback_restores_tracked_state() {
    let config = PageStateConfig::signed("0F1E2D3C4B5A");
    let fields = first_request(&config);
    assert!(fields.event_validation.is_some());

    let mut page = build(&config, PAGE_TYPE);
    page.track_view_state();
    page.load_state(&posted(&fields)).unwrap();
    assert!(page.is_postback());

    let status = control(&mut page, 2);
    assert_eq!(
        status.view_state().get("Text").unwrap(),
        Some(&Value::from("Saved; 2 orders"))
    );
    // untracked declarative values are rebuilt, not persisted
    assert_eq!(status.view_state().get("CssClass").unwrap(), None);

    let name = control(&mut page, 0);
    assert_eq!(
        name.control_state().unwrap().get("SelectedIndex").unwrap(),
        Some(&Value::Int(3))
    );
    assert_eq!(page.controls_requiring_postback(), ["form1$Name".to_string()]);

    assert!(page.client_script().validate_event("form1$Go", Some("submit")).is_ok());
    let err = page
        .client_script()
        .validate_event("form1$Go", Some("delete"))
        .unwrap_err();
    assert!(err.is_untrusted_state());
}

#[test]
fn control_state_survives_disabled_view_state() {
    let config = PageStateConfig::default();
    let mut page = build(&config, PAGE_TYPE);
    page.controls_mut().set_enable_view_state(false);
    page.track_view_state();
    control(&mut page, 0)
        .control_state_mut()
        .unwrap()
        .set("SelectedIndex", 1)
        .unwrap();
    control(&mut page, 1).view_state_mut().set("Text", "Go!").unwrap();
    let fields = page.save_state().unwrap();

    let mut next = build(&config, PAGE_TYPE);
    next.track_view_state();
    next.load_state(&posted(&fields)).unwrap();
    assert_eq!(
        control(&mut next, 0).control_state().unwrap().get("SelectedIndex").unwrap(),
        Some(&Value::Int(1))
    );
    assert_eq!(control(&mut next, 1).view_state().get("Text").unwrap(), None);
}

#[test]
fn tampered_view_state_is_rejected() {
    let config = PageStateConfig::signed("0F1E2D3C4B5A");
    let mut fields = first_request(&config);
    let mut bytes = STANDARD.decode(&fields.view_state).unwrap();
    bytes[2] ^= 0x01;
    fields.view_state = STANDARD.encode(bytes);

    let mut page = build(&config, PAGE_TYPE);
    let err = page.load_state(&posted(&fields)).unwrap_err();
    assert!(err.is_untrusted_state(), "unexpected error: {err}");
}

#[test]
fn state_signed_for_another_user_is_rejected() {
    let alice = PageStateConfig {
        user_key: Some("alice".into()),
        ..PageStateConfig::signed("0F1E2D3C4B5A")
    };
    let bob = PageStateConfig {
        user_key: Some("bob".into()),
        ..alice.clone()
    };
    let fields = first_request(&alice);
    let mut page = build(&bob, PAGE_TYPE);
    assert!(matches!(
        page.load_state(&posted(&fields)),
        Err(PageError::Format(_))
    ));
}

#[test]
fn changed_layout_skips_view_state_but_keeps_control_state() {
    let config = PageStateConfig::default();
    let fields = first_request(&config);

    let mut page = build(&config, "ASP.orders_v2_aspx");
    page.track_view_state();
    page.load_state(&posted(&fields)).unwrap();
    assert_eq!(control(&mut page, 2).view_state().get("Text").unwrap(), None);
    assert_eq!(
        control(&mut page, 0).control_state().unwrap().get("SelectedIndex").unwrap(),
        Some(&Value::Int(3))
    );
}

#[test]
fn missing_event_validation_rejects_postback_events() {
    let config = PageStateConfig::default();
    let mut fields = first_request(&config);
    fields.event_validation = None;
    let mut page = build(&config, PAGE_TYPE);
    page.load_state(&posted(&fields)).unwrap();
    assert!(matches!(
        page.client_script().validate_event("form1$Go", Some("submit")),
        Err(PageError::InvalidPostBackEvent { .. })
    ));
}

struct OrderSummary;

impl CachedContent for OrderSummary {
    fn render(
        &mut self,
        out: &mut String,
        registrar: &mut dyn ClientRegistrar,
    ) -> Result<(), CacheError> {
        out.push_str("<a id=\"Summary$Refresh\">refresh</a>");
        registrar.register_for_event_validation("Summary$Refresh", None);
        Ok(())
    }
}

#[test]
fn cached_fragment_reregisters_events_on_every_page() {
    let config = PageStateConfig::default();
    let store = Arc::new(MemoryFragmentStore::new());
    let policy = CachePolicy::for_duration(Duration::from_secs(300));
    let values = RequestValues::new();

    let render_page = || {
        let mut page = build(&config, PAGE_TYPE);
        let mut summary = PartialCachingControl::new(
            "Summary",
            "orders-summary",
            policy.clone(),
            store.clone(),
            Box::new(|| Box::new(OrderSummary) as Box<dyn CachedContent>),
        );
        summary
            .init(&FragmentRequest::new(&values), page.client_script_mut())
            .unwrap();
        summary.pre_render(page.client_script_mut());
        let mut html = String::new();
        summary.render(&mut html, page.client_script_mut()).unwrap();
        (summary.state(), html, page.save_state().unwrap())
    };

    let (first_state, first_html, _) = render_page();
    let (second_state, second_html, fields) = render_page();
    assert_eq!(first_state, FragmentState::MissCached);
    assert_eq!(second_state, FragmentState::Hit);
    assert_eq!(first_html, second_html);

    let mut postback = build(&config, PAGE_TYPE);
    postback.load_state(&posted(&fields)).unwrap();
    assert!(postback.client_script().validate_event("Summary$Refresh", None).is_ok());
}

#[test]
fn partial_postback_keeps_events_it_did_not_rerender() {
    let config = PageStateConfig::default();
    let fields = first_request(&config);

    let mut partial = build(&config, PAGE_TYPE);
    partial.load_state(&posted(&fields)).unwrap();
    partial.track_view_state();
    partial.client_script_mut().seed_from_posted();
    partial
        .client_script_mut()
        .register_for_event_validation("form1$Status", Some("refresh"));
    let fields = partial.save_state().unwrap();

    let mut next = build(&config, PAGE_TYPE);
    next.load_state(&posted(&fields)).unwrap();
    let scripts = next.client_script();
    assert!(scripts.validate_event("form1$Go", Some("submit")).is_ok());
    assert!(scripts.validate_event("form1$Status", Some("refresh")).is_ok());
}
