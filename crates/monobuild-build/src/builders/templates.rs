//! 生成する Dockerfile のテンプレート

/// .NET プロジェクト用
///
/// 依存プロジェクトの .csproj を先にコピーして restore をレイヤーキャッシュさせる。
pub const DOTNET_DOCKERFILE: &str = r##"FROM mcr.microsoft.com/dotnet/core/sdk:#{DOTNET_VERSION}# AS build-env

# Copy csproj and restore as distinct layers
#{COPY_PROJECT_DEPENDENCIES_PROJECTFILES}#

#{COPY_PROJECTFILE}#

WORKDIR #{PROJECTDIR}#
RUN dotnet restore

# Copy everything else and build
#{COPY_PROJECT_DEPENDENCIES}#
#{COPY_PROJECTDIR}#

RUN dotnet publish -c Release -o out

# Build runtime image
FROM #{DOCKER_RUNTIME_IMAGE}#:#{DOTNET_VERSION}#
WORKDIR /app
COPY --from=build-env #{PROJECTDIR}#/out .
ENTRYPOINT ["dotnet", "#{PROJECTNAME}#.dll"]
"##;

/// Node.js プロジェクト用
pub const NODE_DOCKERFILE: &str = r#"FROM node:#{NODE_VERSION}#-alpine

WORKDIR /usr/src/app
COPY package.json yarn.lock package-lock.json ./

#{INSTALL_AND_AUDIT}#

COPY / ./

#{BUILD_COMMAND}#

CMD #{RUN_COMMAND}#
"#;
