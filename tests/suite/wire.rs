//! Wire format checks across the core/shell boundary.

use tether_core::CounterCore;
use tether_types::{
    Core, CoreError, Effect, Event, HttpMethod, HttpResponse, Request, RequestId, SseResponse,
    ViewModel, WireMessage,
};

fn requests(bytes: &[u8]) -> Vec<Request> {
    Vec::<Request>::from_bytes(bytes).unwrap()
}

#[test]
fn events_have_fixed_width_variant_tags() {
    assert_eq!(Event::StartWatch.to_bytes().unwrap(), vec![0, 0, 0, 0]);
    assert_eq!(Event::Decrement.to_bytes().unwrap(), vec![2, 0, 0, 0]);
}

#[test]
fn counter_core_speaks_the_wire_format() {
    let mut core = CounterCore::new("http://counter.test");

    let batch = requests(&core.process_event(&Event::Increment.to_bytes().unwrap()).unwrap());
    assert_eq!(batch.len(), 2);
    assert_eq!(batch[0].effect, Effect::Render);
    let Effect::Http(request) = &batch[1].effect else {
        panic!("expected http effect, got {:?}", batch[1].effect);
    };
    assert_eq!(request.method, HttpMethod::Post);
    assert_eq!(request.url, "http://counter.test/inc");

    let view = ViewModel::from_bytes(&core.view().unwrap()).unwrap();
    assert_eq!(view.text, "1");

    let response = HttpResponse::new(200, r#"{"value":5}"#).to_bytes().unwrap();
    let batch = requests(&core.handle_response(batch[1].id.as_bytes(), &response).unwrap());
    assert_eq!(batch.len(), 1);
    assert_eq!(batch[0].effect, Effect::Render);
    assert_eq!(
        ViewModel::from_bytes(&core.view().unwrap()).unwrap().text,
        "5"
    );
}

#[test]
fn core_rejects_malformed_and_unknown_input() {
    let mut core = CounterCore::default();

    let err = core.process_event(&[9, 0, 0, 0]).unwrap_err();
    assert!(matches!(err, CoreError::Codec(_)));

    let chunk = SseResponse::Chunk(b"data: {\"value\":1}\n\n".to_vec())
        .to_bytes()
        .unwrap();
    let err = core
        .handle_response(RequestId::new(vec![1, 2]).as_bytes(), &chunk)
        .unwrap_err();
    assert!(matches!(err, CoreError::UnknownRequest { .. }));
}
