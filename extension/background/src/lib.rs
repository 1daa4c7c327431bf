//! Background worker for the Edge2Chrome extension.
//!
//! Page contexts send `openInChrome` requests through `chrome.runtime`. Each
//! one is relayed to the launcher host over a fresh native-messaging port and
//! answered with a [`RedirectEnvelope`]. Reply, disconnect and timeout race to
//! finish the request; [`Exchange`] decides which one wins.

use std::cell::RefCell;
use std::rc::Rc;

use e2c_protocol::{
	DEFAULT_LAUNCH_ARGS, Exchange, ExtensionRequest, HOST_NAME, LaunchRequest, RedirectEnvelope, RedirectResult,
	Resolution, SOURCE_TAG,
};
use js_sys::{Array, Function, Object, Reflect};
use serde::Serialize;
use serde_json::Value;
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;

const TIMEOUT_MS: i32 = 3000;
const LOG_LIMIT: usize = 40;

thread_local! {
	static LOG: RefCell<Vec<String>> = const { RefCell::new(Vec::new()) };
}

/// One in-flight redirect.
struct Pending {
	exchange: Exchange,
	url: String,
	port: Option<Port>,
	timer: Option<JsValue>,
	respond: Function,
}

type Shared = Rc<RefCell<Pending>>;

#[wasm_bindgen(start)]
pub fn start() {
	console_error_panic_hook::set_once();

	let listener = Closure::<dyn FnMut(JsValue, JsValue, Function) -> bool>::new(on_runtime_message);
	runtime_on_message_add_listener(&listener);
	listener.forget();

	push_log("background worker started");
}

/// Returns `true` to keep the reply channel open until the exchange resolves.
fn on_runtime_message(message: JsValue, _sender: JsValue, send_response: Function) -> bool {
	let Ok(request) = serde_wasm_bindgen::from_value::<ExtensionRequest>(message) else {
		return false;
	};
	match request {
		ExtensionRequest::OpenInChrome { url, launch_args } => {
			let request = launch_request(url, launch_args, js_sys::Date::now() as u64);
			redirect(request, send_response);
			true
		}
	}
}

/// `SystemTime` is unavailable here, so the timestamp comes from the caller.
fn launch_request(url: String, launch_args: Option<String>, timestamp: u64) -> LaunchRequest {
	LaunchRequest {
		url,
		source: SOURCE_TAG.to_string(),
		launch_args: launch_args.unwrap_or_else(|| DEFAULT_LAUNCH_ARGS.to_string()),
		timestamp,
	}
}

fn redirect(request: LaunchRequest, respond: Function) {
	let pending: Shared = Rc::new(RefCell::new(Pending {
		exchange: Exchange::new(),
		url: request.url.clone(),
		port: None,
		timer: None,
		respond,
	}));
	pending.borrow_mut().exchange.begin();

	let port = match runtime_connect_native(HOST_NAME) {
		Ok(port) => port,
		Err(err) => {
			let resolution = pending.borrow_mut().exchange.connect_failed(stringify_js_error(err));
			if let Some(resolution) = resolution {
				finish(&pending, resolution);
			}
			return;
		}
	};

	// Host reply
	{
		let shared = pending.clone();
		let on_message = Closure::<dyn FnMut(JsValue)>::new(move |reply: JsValue| {
			let payload: Value = serde_wasm_bindgen::from_value(reply).unwrap_or(Value::Null);
			let resolution = shared.borrow_mut().exchange.on_response(payload);
			if let Some(resolution) = resolution {
				finish(&shared, resolution);
			}
		});
		port.on_message().add_listener(&on_message.into_js_value());
	}

	// Host exited or could not be started
	{
		let shared = pending.clone();
		let on_disconnect = Closure::<dyn FnMut(JsValue)>::new(move |_port: JsValue| {
			let resolution = shared.borrow_mut().exchange.on_disconnect(last_error_message());
			if let Some(resolution) = resolution {
				finish(&shared, resolution);
			}
		});
		port.on_disconnect().add_listener(&on_disconnect.into_js_value());
	}

	if !pending.borrow_mut().exchange.connected() {
		return;
	}

	let timer = {
		let shared = pending.clone();
		let on_timeout = Closure::once_into_js(move || {
			let resolution = shared.borrow_mut().exchange.on_timeout();
			if let Some(resolution) = resolution {
				finish(&shared, resolution);
			}
		});
		set_timeout(on_timeout.unchecked_ref(), TIMEOUT_MS)
	};

	{
		let mut state = pending.borrow_mut();
		state.port = Some(port.clone());
		state.timer = Some(timer);
	}

	if let Err(err) = to_js(&request).and_then(|message| port.post_message(&message)) {
		let resolution = pending.borrow_mut().exchange.on_disconnect(Some(stringify_js_error(err)));
		if let Some(resolution) = resolution {
			finish(&pending, resolution);
		}
	}
}

/// Applies the resolution's side effects and answers the page.
fn finish(pending: &Shared, resolution: Resolution) {
	let (port, timer, respond, url) = {
		let mut state = pending.borrow_mut();
		(state.port.take(), state.timer.take(), state.respond.clone(), state.url.clone())
	};

	if resolution.cancel_timer {
		if let Some(timer) = timer {
			clear_timeout(&timer);
		}
	}
	if resolution.close_session {
		if let Some(port) = port {
			port.disconnect();
		}
	}

	match &resolution.result {
		RedirectResult::Success(_) => push_log(&format!("opened: {url}")),
		RedirectResult::Failure(reason) => {
			web_sys::console::warn_1(&JsValue::from_str(&format!("e2c: redirect of {url} failed: {reason}")));
			push_log(&format!("failed: {url} ({reason})"));
		}
	}

	let envelope = RedirectEnvelope::from(&resolution.result);
	match to_js(&envelope) {
		Ok(value) => {
			let _ = respond.call1(&JsValue::NULL, &value);
		}
		Err(err) => push_log(&format!("reply encoding failed: {}", stringify_js_error(err))),
	}
}

/// Plain objects rather than `Map`s, which `postMessage` and `sendResponse` expect.
fn to_js<T: Serialize>(value: &T) -> Result<JsValue, JsValue> {
	value
		.serialize(&serde_wasm_bindgen::Serializer::json_compatible())
		.map_err(JsValue::from)
}

fn last_error_message() -> Option<String> {
	let chrome = Reflect::get(&js_sys::global(), &JsValue::from_str("chrome")).ok()?;
	let runtime = Reflect::get(&chrome, &JsValue::from_str("runtime")).ok()?;
	let error = Reflect::get(&runtime, &JsValue::from_str("lastError")).ok()?;
	if error.is_undefined() || error.is_null() {
		return None;
	}
	Reflect::get(&error, &JsValue::from_str("message")).ok()?.as_string()
}

fn stringify_js_error(err: JsValue) -> String {
	err.as_string()
		.or_else(|| {
			Reflect::get(&err, &JsValue::from_str("message"))
				.ok()?
				.as_string()
		})
		.or_else(|| js_sys::JSON::stringify(&err).ok()?.as_string())
		.unwrap_or_else(|| format!("{:?}", err))
}

fn push_log(line: &str) {
	web_sys::console::log_1(&JsValue::from_str(line));
	LOG.with(|log| {
		let mut vec = log.borrow_mut();
		vec.push(line.to_string());
		if vec.len() > LOG_LIMIT {
			let excess = vec.len() - LOG_LIMIT;
			vec.drain(0..excess);
		}
		persist_log(&vec);
	});
}

fn persist_log(lines: &[String]) {
	let array = Array::new();
	for line in lines {
		array.push(&JsValue::from_str(line));
	}
	let obj = Object::new();
	let _ = Reflect::set(&obj, &JsValue::from_str("e2c_log"), &array);
	let _ = storage_local_set(&obj);
}

#[wasm_bindgen]
extern "C" {
	#[wasm_bindgen(js_namespace = ["chrome", "runtime", "onMessage"], js_name = addListener)]
	fn runtime_on_message_add_listener(cb: &Closure<dyn FnMut(JsValue, JsValue, Function) -> bool>);

	#[wasm_bindgen(catch, js_namespace = ["chrome", "runtime"], js_name = connectNative)]
	fn runtime_connect_native(application: &str) -> Result<Port, JsValue>;

	#[derive(Clone)]
	type Port;

	#[wasm_bindgen(method, catch, js_name = postMessage)]
	fn post_message(this: &Port, message: &JsValue) -> Result<(), JsValue>;

	#[wasm_bindgen(method)]
	fn disconnect(this: &Port);

	#[wasm_bindgen(method, getter, js_name = onMessage)]
	fn on_message(this: &Port) -> PortEvent;

	#[wasm_bindgen(method, getter, js_name = onDisconnect)]
	fn on_disconnect(this: &Port) -> PortEvent;

	type PortEvent;

	#[wasm_bindgen(method, js_name = addListener)]
	fn add_listener(this: &PortEvent, callback: &JsValue);

	#[wasm_bindgen(js_name = setTimeout)]
	fn set_timeout(handler: &Function, timeout: i32) -> JsValue;

	#[wasm_bindgen(js_name = clearTimeout)]
	fn clear_timeout(handle: &JsValue);

	#[wasm_bindgen(js_namespace = ["chrome", "storage", "local"], js_name = set)]
	fn storage_local_set(items: &JsValue) -> js_sys::Promise;
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn missing_args_fall_back_to_default() {
		let request = launch_request("https://www.zhihu.com/".into(), None, 42);
		assert_eq!(request.launch_args, DEFAULT_LAUNCH_ARGS);
		assert_eq!(request.source, SOURCE_TAG);
		assert_eq!(request.timestamp, 42);
	}

	#[test]
	fn page_request_args_are_forwarded() {
		let json = r#"{"action":"openInChrome","url":"https://a.test/","chromeArgs":"--incognito"}"#;
		let ExtensionRequest::OpenInChrome { url, launch_args } = serde_json::from_str(json).unwrap();
		let request = launch_request(url, launch_args, 0);
		let wire = serde_json::to_value(&request).unwrap();
		assert_eq!(wire["chromeArgs"], "--incognito");
		assert_eq!(wire["url"], "https://a.test/");
	}
}
