use tonic_build::manual::{Builder, Method, Service};

const CODEC: &str = "tonic::codec::ProstCodec";

fn unary(name: &str, route: &str, input: &str, output: &str) -> Method {
    Method::builder()
        .name(name)
        .route_name(route)
        .input_type(format!("crate::rpc::proto::{}", input))
        .output_type(format!("crate::rpc::proto::{}", output))
        .codec_path(CODEC)
        .build()
}

fn main() {
    // Messages are declared by hand in src/rpc/proto.rs, so only the service
    // glue is generated here and no protoc is needed.
    let bank = Service::builder()
        .name("BankService")
        .package("bank.v1")
        .method(unary(
            "create_account",
            "CreateAccount",
            "CreateAccountRequest",
            "CreateAccountResponse",
        ))
        .method(unary(
            "get_balance",
            "GetBalance",
            "GetBalanceRequest",
            "GetBalanceResponse",
        ))
        .method(unary(
            "deposit",
            "Deposit",
            "DepositRequest",
            "DepositResponse",
        ))
        .method(unary(
            "withdraw",
            "Withdraw",
            "WithdrawRequest",
            "WithdrawResponse",
        ))
        .build();

    Builder::new().compile(&[bank]);
    println!("cargo:rerun-if-changed=build.rs");
}
