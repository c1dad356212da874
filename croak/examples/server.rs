use croak::blocking::Server;
use croak::resp::{code, Resp};

fn main() {
  simple_logger::init_with_level(log::Level::Debug).unwrap();

  let server = Server::new("0.0.0.0:5683".parse().unwrap()).unwrap();
  log::info!("listening on {}", server.local_addr());

  server.run_fn(|req| {
          let mut resp = Resp::for_request(req.data()).unwrap();

          match req.data().path().as_deref() {
            | Ok("hello") => {
              let name = match req.data().payload_str() {
                | Ok("") | Err(_) => "world",
                | Ok(name) => name,
              };

              resp.set_code(code::CONTENT);
              resp.set_payload(format!("hello, {}!", name).into_bytes());
            },
            | _ => {
              resp.set_code(code::NOT_FOUND);
            },
          }

          resp
        })
        .unwrap();
}
