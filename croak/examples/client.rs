use croak::blocking::Client;

fn main() {
  simple_logger::init_with_level(log::Level::Debug).unwrap();

  let url = std::env::args().nth(1)
                            .unwrap_or_else(|| "coap://127.0.0.1:5683/hello".to_string());

  let mut client = Client::new();

  match client.get(&url) {
    | Ok(resp) => {
      log::info!("{} {:?}", resp.status(), resp.payload_string().unwrap());
    },
    | Err(e) => {
      log::error!("request failed: {}", e);
    },
  }
}
